//! SerialScope - Main Entry Point
//!
//! Headless observer: reads a serial device (or a recorded session), frames the
//! stream into events, filters them and prints one line per event to stdout.
//! Diagnostics go to stderr and, optionally, a log file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serialscope::{
    config::{default_config_path, ScopeConfig},
    Event, EventPipeline, FramerMode, SerialSource, SessionRecorder, SessionReplayer,
    StageRegistry, StreamFramer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long one `read` waits before the loop re-checks the reader
const READ_WAIT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "serialscope",
    version,
    about = "Observe structured logs, metrics and packets from a serial device",
    after_help = "Examples:\n  serialscope --port /dev/ttyUSB0 --baud 115200\n  \
                  serialscope --json --record\n  \
                  serialscope --filter ERROR,WARN --search 'motor'\n  \
                  serialscope --replay sessions/session_2024-05-01_12-00-00.log --replay-speed 2"
)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port, e.g. /dev/ttyUSB0, COM3 or 'auto'
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Read timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Stream format
    #[arg(long, value_parser = parse_mode)]
    mode: Option<FramerMode>,

    /// Force JSON framing (shortcut for --mode json)
    #[arg(long)]
    json: bool,

    /// Only show these levels, e.g. ERROR,WARN
    #[arg(long, value_delimiter = ',')]
    filter: Vec<String>,

    /// Only show events matching this regex
    #[arg(long)]
    search: Option<String>,

    /// Extra pipeline stage by name (repeatable)
    #[arg(long = "stage")]
    stages: Vec<String>,

    /// Record the session to a file
    #[arg(long)]
    record: bool,

    /// Session file to record to (implies --record)
    #[arg(long)]
    record_file: Option<PathBuf>,

    /// Replay a recorded session instead of reading a device
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay speed multiplier; 0 replays without delays
    #[arg(long)]
    replay_speed: Option<f64>,

    /// Stop when the device is lost instead of reconnecting
    #[arg(long)]
    no_reconnect: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Also write diagnostics to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_mode(value: &str) -> Result<FramerMode, String> {
    value.parse().map_err(|e: serialscope::ScopeError| e.to_string())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Held until exit so the file writer flushes
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    run(cli)
}

fn init_tracing(verbose: u8, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_filter = if verbose > 0 {
        "debug"
    } else {
        "info,serialscope=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.list_ports {
        return list_ports();
    }

    let mut config = match &cli.config {
        Some(path) => ScopeConfig::load(path)?,
        None => ScopeConfig::load_or_default(),
    };
    if cli.config.is_none() {
        tracing::debug!(path = ?default_config_path(), "Using default config location");
    }
    apply_overrides(&mut config, &cli);

    let registry = StageRegistry::with_builtins();
    let mut pipeline = EventPipeline::from_filter_config(&config.filter, &registry)?;

    match &cli.replay {
        Some(path) => replay(path, config.session.replay_speed, &mut pipeline),
        None => live(&config, &mut pipeline),
    }
}

/// Command-line flags win over file values
fn apply_overrides(config: &mut ScopeConfig, cli: &Cli) {
    if let Some(port) = &cli.port {
        config.source.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.source.baud_rate = baud;
    }
    if let Some(secs) = cli.timeout {
        config.source.read_timeout_ms = (secs.max(0.0) * 1000.0).round() as u64;
    }
    if cli.no_reconnect {
        config.source.auto_reconnect = false;
    }

    if cli.json {
        config.framer.mode = FramerMode::Json;
    } else if let Some(mode) = cli.mode {
        config.framer.mode = mode;
    }

    if !cli.filter.is_empty() {
        config.filter.levels = cli.filter.clone();
    }
    if let Some(search) = &cli.search {
        config.filter.search = Some(search.clone());
    }
    config.filter.stages.extend(cli.stages.iter().cloned());

    if cli.record || cli.record_file.is_some() {
        config.session.record = true;
    }
    if let Some(path) = &cli.record_file {
        config.session.record_path = Some(path.clone());
    }
    if let Some(speed) = cli.replay_speed {
        config.session.replay_speed = speed;
    }
}

fn list_ports() -> anyhow::Result<ExitCode> {
    let ports = SerialSource::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in &ports {
        let marker = if port.is_known_bridge() { "*" } else { " " };
        println!("{} {}", marker, port);
    }
    Ok(ExitCode::SUCCESS)
}

fn replay(path: &Path, speed: f64, pipeline: &mut EventPipeline) -> anyhow::Result<ExitCode> {
    tracing::info!("Replaying session from {}", path.display());
    let mut replayer = SessionReplayer::open(path, speed)?;
    let mut events = replayer.events()?;

    for event in events.by_ref() {
        if let Some(event) = pipeline.process(event) {
            print_event(&event);
        }
    }

    if events.skipped() > 0 {
        tracing::warn!(skipped = events.skipped(), "Some session lines could not be parsed");
    }
    Ok(ExitCode::SUCCESS)
}

fn live(config: &ScopeConfig, pipeline: &mut EventPipeline) -> anyhow::Result<ExitCode> {
    let source = SerialSource::new(config.source.clone());
    if let Err(e) = source.connect() {
        tracing::error!("Failed to connect to serial port: {}", e);
        return Ok(ExitCode::from(1));
    }

    let mut recorder = if config.session.record {
        let mut recorder = match &config.session.record_path {
            Some(path) => SessionRecorder::new(path)?,
            None => SessionRecorder::in_dir(&config.session.sessions_dir)?,
        };
        recorder.start()?;
        Some(recorder)
    } else {
        None
    };

    let mut framer = StreamFramer::new(config.framer.mode);
    source.start_reading()?;

    loop {
        let Some(chunk) = source.read(Some(READ_WAIT)) else {
            if !source.is_reading() {
                break;
            }
            continue;
        };

        for event in framer.feed(&chunk) {
            let Some(event) = pipeline.process(event) else {
                continue;
            };
            if let Some(recorder) = recorder.as_mut() {
                if let Err(e) = recorder.record(&event) {
                    tracing::error!("Failed to record event: {}", e);
                }
            }
            print_event(&event);
        }
    }

    let stats = source.stats();
    tracing::info!(
        chunks = stats.chunks_read,
        bytes = stats.bytes_read,
        reconnects = stats.reconnects,
        "Serial reader finished"
    );
    if let Some(recorder) = recorder.as_mut() {
        recorder.stop();
    }
    source.disconnect();
    Ok(ExitCode::SUCCESS)
}

fn print_event(event: &Event) {
    let level = event.level.map_or("INFO", |l| l.as_str());
    let data = serde_json::to_string(&event.data).unwrap_or_default();
    println!("[{}] {}", level, data);
}
