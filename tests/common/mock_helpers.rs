//! Mock construction helpers

use serialscope::config::SourceConfig;
use serialscope::source::{MockPorts, SerialSource};

/// Source settings with short intervals so tests finish quickly
pub fn fast_source_config() -> SourceConfig {
    SourceConfig {
        read_timeout_ms: 1000,
        reconnect_interval_ms: 20,
        poll_interval_ms: 1,
        ..SourceConfig::default()
    }
}

/// A source wired to an in-memory port, plus the handle that drives it
pub fn create_mock_source(config: SourceConfig) -> (SerialSource, MockPorts) {
    let ports = MockPorts::new();
    let source = SerialSource::with_provider(config, Box::new(ports.clone()));
    (source, ports)
}
