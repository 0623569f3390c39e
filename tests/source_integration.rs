//! Serial source against in-memory ports: reading, reconnecting, callbacks

mod common;

use std::sync::{Arc, Mutex};

use common::mock_helpers::{create_mock_source, fast_source_config};
use common::{test_timeout, wait_for};
use serial_test::serial;
use serialscope::config::SourceConfig;
use serialscope::{LogLevel, StreamFramer};

#[test]
#[serial]
fn test_split_lines_survive_chunking() {
    let (source, ports) = create_mock_source(fast_source_config());
    source.start_reading().unwrap();

    ports.push_chunk(b"[INFO] hel".to_vec());
    ports.push_chunk(b"lo\n[ERROR] bo".to_vec());
    ports.push_chunk(b"om\n".to_vec());

    let mut framer = StreamFramer::default();
    let mut events = Vec::new();
    while events.len() < 2 {
        let chunk = source.read(Some(test_timeout())).expect("chunk");
        events.extend(framer.feed(&chunk));
    }

    assert_eq!(events[0].message(), Some("hello"));
    assert_eq!(events[1].level, Some(LogLevel::Error));
    assert_eq!(events[1].message(), Some("boom"));
    source.disconnect();
}

#[test]
#[serial]
fn test_reconnects_after_unplug() {
    let (source, ports) = create_mock_source(fast_source_config());
    source.start_reading().unwrap();

    ports.push_chunk(b"before\n".to_vec());
    assert_eq!(source.read(Some(test_timeout())).as_deref(), Some(&b"before\n"[..]));

    ports.unplug();
    assert!(wait_for(test_timeout(), || source.stats().read_errors >= 1));
    assert!(source.is_reading());

    ports.plug_in();
    assert!(wait_for(test_timeout(), || source.stats().reconnects >= 1));

    ports.push_chunk(b"after\n".to_vec());
    assert_eq!(source.read(Some(test_timeout())).as_deref(), Some(&b"after\n"[..]));
    assert!(ports.open_count() >= 2);
    source.disconnect();
}

#[test]
#[serial]
fn test_reader_stops_without_auto_reconnect() {
    let config = SourceConfig {
        auto_reconnect: false,
        ..fast_source_config()
    };
    let (source, ports) = create_mock_source(config);
    source.start_reading().unwrap();

    ports.unplug();
    assert!(wait_for(test_timeout(), || !source.is_reading()));
    assert!(!source.is_connected());
    assert_eq!(ports.open_count(), 1);
}

#[test]
#[serial]
fn test_callbacks_see_every_chunk_in_order() {
    let (source, ports) = create_mock_source(fast_source_config());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    source.register_callback(move |chunk| {
        sink.lock().unwrap().extend_from_slice(chunk);
        Ok(())
    });
    source.register_callback(|_| anyhow::bail!("display went away"));

    source.start_reading().unwrap();
    for part in [&b"ab"[..], b"cd", b"ef"] {
        ports.push_chunk(part.to_vec());
    }

    assert!(wait_for(test_timeout(), || seen.lock().unwrap().len() == 6));
    assert_eq!(*seen.lock().unwrap(), b"abcdef");
    assert!(wait_for(test_timeout(), || source.stats().callback_failures == 3));

    // Queue still received everything despite the failing callback
    let queued: Vec<u8> = source.drain().concat();
    assert_eq!(queued, b"abcdef");
    source.disconnect();
}

#[test]
#[serial]
fn test_write_round_trip() {
    let (source, ports) = create_mock_source(fast_source_config());
    assert!(source.write(b"ping").is_err());

    source.connect().unwrap();
    assert_eq!(source.write(b"ping\n").unwrap(), 5);
    assert_eq!(ports.written(), b"ping\n");
    assert_eq!(source.port_name().as_deref(), Some(serialscope::source::MOCK_DEVICE));
}
