//! Motion Sensor Agent CLI
//!
//! Accelerometer vibration-event detector.

use clap::{Parser, Subcommand};
use motion_sensor_agent::{
    config::Config,
    control::ControlMailbox,
    core::{Pipeline, Sampler, SystemClock},
    publisher::{Feedback, LogTransport, Publisher, TerminalBell, Transport},
    sensor::{AccelerationSource, ReplayAccelerometer, SyntheticAccelerometer, Waveform},
    telemetry::create_shared_log_with_persistence,
    VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gateway")]
use motion_sensor_agent::{GatewayConfig, GatewayTransport};

#[derive(Parser)]
#[command(name = "motion-sensor")]
#[command(version = VERSION)]
#[command(about = "Accelerometer vibration-event detector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start sampling and publishing events
    Start {
        /// Acceleration source (synthetic or replay)
        #[arg(long, default_value = "synthetic")]
        source: String,

        /// JSON-lines recording to play back (with --source replay)
        #[arg(long)]
        replay_file: Option<PathBuf>,

        /// Synthetic waveform (rest, sine or silence)
        #[arg(long, default_value = "rest")]
        waveform: String,

        /// Stop after this many completed cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Event transport (gateway or log)
        #[arg(long, default_value = "gateway")]
        transport: String,

        /// Port for the local control server
        #[arg(long)]
        control_port: Option<u16>,
    },

    /// Toggle realtime reporting on a running agent
    Toggle {
        /// Message body to send
        #[arg(long, default_value = "toggle")]
        payload: String,

        /// Control server port of the running agent
        #[arg(long)]
        control_port: Option<u16>,
    },

    /// Show persisted statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            source,
            replay_file,
            waveform,
            cycles,
            transport,
            control_port,
        } => {
            cmd_start(
                &source,
                replay_file,
                &waveform,
                cycles,
                &transport,
                control_port,
            );
        }
        Commands::Toggle {
            payload,
            control_port,
        } => {
            cmd_toggle(&payload, control_port);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_start(
    source: &str,
    replay_file: Option<PathBuf>,
    waveform: &str,
    cycles: Option<u64>,
    transport: &str,
    control_port: Option<u16>,
) {
    println!("Motion Sensor Agent v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(port) = control_port {
        config.transport.control_port = port;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let rate = config.sampling.sample_rate_hz;
    let source: Box<dyn AccelerationSource> = match source {
        "synthetic" => match Waveform::from_name(waveform) {
            Some(waveform) => Box::new(SyntheticAccelerometer::new(waveform, rate)),
            None => {
                eprintln!("Error: Unknown waveform '{waveform}' (expected rest, sine or silence)");
                std::process::exit(1);
            }
        },
        "replay" => match replay_file {
            Some(path) => Box::new(ReplayAccelerometer::from_path(path)),
            None => {
                eprintln!("Error: --source replay requires --replay-file");
                std::process::exit(1);
            }
        },
        other => {
            eprintln!("Error: Unknown source '{other}' (expected synthetic or replay)");
            std::process::exit(1);
        }
    };

    // The only fatal runtime condition: no sensor at start-up.
    let sampler = match Sampler::start(source, SystemClock::new(), rate) {
        Ok(sampler) => sampler,
        Err(e) => {
            tracing::error!("accelerometer unavailable: {e}");
            eprintln!("Error: Accelerometer unavailable: {e}");
            std::process::exit(1);
        }
    };

    println!("Starting pipeline...");
    println!(
        "  Sampling: {} Hz, window {} samples ({:.2} Hz bins)",
        rate,
        config.sampling.window_len,
        config.sampling.bin_width_hz()
    );
    println!(
        "  Low-pass corner: {} Hz",
        config.sampling.corner_frequency_hz
    );
    println!(
        "  Energy threshold: {} over {} band bins",
        config.detection.energy_threshold, config.detection.low_band_bins
    );

    let transport = build_transport(transport, &config);
    println!("  Publish topic: {}", config.transport.publish_topic);

    let feedback_enabled = config.feedback.enabled;
    let mut bell = TerminalBell;
    let feedback = move |tone: Duration| {
        if feedback_enabled {
            bell.signal(tone);
        }
    };

    let publisher = Publisher::new(
        transport,
        feedback,
        config.transport.publish_topic.clone(),
        config.payload.budget(),
        config.feedback.tone(),
    );

    let telemetry = create_shared_log_with_persistence(config.data_path.join("telemetry.json"));
    let mailbox = ControlMailbox::new();

    #[cfg(feature = "server")]
    let server = start_control_server(&config, mailbox.sender(), telemetry.clone());

    let mut pipeline = match Pipeline::new(&config, sampler, publisher, mailbox, telemetry.clone())
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let completed = pipeline.run(&running, cycles);
    let sensor_lost =
        running.load(Ordering::SeqCst) && cycles.map_or(true, |max| completed < max);

    println!();
    if sensor_lost {
        eprintln!("Error: accelerometer stopped responding");
    }
    println!("Stopping after {completed} cycles...");

    #[cfg(feature = "server")]
    if let Some((runtime, shutdown_tx)) = server {
        let _ = shutdown_tx.send(());
        runtime.shutdown_timeout(Duration::from_secs(1));
    }

    if let Err(e) = telemetry.save() {
        eprintln!("Warning: Could not save telemetry: {e}");
    }

    println!();
    println!("{}", telemetry.summary());

    if sensor_lost {
        std::process::exit(1);
    }
}

fn build_transport(kind: &str, config: &Config) -> Box<dyn Transport> {
    match kind {
        "log" => {
            println!("  Transport: log (stdout)");
            Box::new(LogTransport)
        }
        #[cfg(feature = "gateway")]
        "gateway" => {
            let gateway_config = GatewayConfig::from_transport(&config.transport);
            println!("  Transport: gateway at {}", gateway_config.url());
            println!("  Client ID: {}", gateway_config.client_id);
            match GatewayTransport::connect(gateway_config) {
                Ok(transport) => {
                    if !transport.connected() {
                        eprintln!(
                            "Warning: Gateway not reachable, retrying every {}s",
                            config.transport.reconnect_backoff.as_secs()
                        );
                    }
                    Box::new(transport)
                }
                Err(e) => {
                    eprintln!("Warning: Gateway initialization failed: {e}");
                    eprintln!("Continuing with log transport.");
                    Box::new(LogTransport)
                }
            }
        }
        #[cfg(not(feature = "gateway"))]
        "gateway" => {
            let _ = config;
            eprintln!("Warning: gateway feature not enabled at compile time, using log transport");
            Box::new(LogTransport)
        }
        other => {
            eprintln!("Error: Unknown transport '{other}' (expected gateway or log)");
            std::process::exit(1);
        }
    }
}

/// Spawn the control server on its own runtime.
#[cfg(feature = "server")]
fn start_control_server(
    config: &Config,
    sender: motion_sensor_agent::ControlSender,
    telemetry: motion_sensor_agent::SharedTelemetryLog,
) -> Option<(tokio::runtime::Runtime, tokio::sync::oneshot::Sender<()>)> {
    use motion_sensor_agent::server::{run, ServerConfig};

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Warning: Could not start control server runtime: {e}");
            return None;
        }
    };

    let server_config = ServerConfig::new(
        config.transport.control_port,
        config.transport.control_topic.clone(),
    );
    match runtime.block_on(run(server_config, sender, telemetry)) {
        Ok((addr, shutdown_tx)) => {
            println!(
                "  Control: POST http://{}/control/{}",
                addr, config.transport.control_topic
            );
            Some((runtime, shutdown_tx))
        }
        Err(e) => {
            eprintln!("Warning: Control server failed to start: {e}");
            None
        }
    }
}

#[cfg(feature = "gateway")]
fn cmd_toggle(payload: &str, control_port: Option<u16>) {
    let config = load_config();
    let port = control_port.unwrap_or(config.transport.control_port);
    let url = format!(
        "http://127.0.0.1:{}/control/{}",
        port, config.transport.control_topic
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        reqwest::Client::new()
            .post(&url)
            .body(payload.to_string())
            .timeout(Duration::from_secs(5))
            .send()
            .await
    });

    match result {
        Ok(response) if response.status().is_success() => {
            println!("Control message sent to {url}");
            println!("Reporting mode toggles at the end of the current cycle.");
        }
        Ok(response) => {
            eprintln!("Error: Agent rejected control message ({})", response.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: Could not reach agent at {url}: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "gateway"))]
fn cmd_toggle(_payload: &str, _control_port: Option<u16>) {
    eprintln!("Error: toggle requires the gateway feature (HTTP client)");
    std::process::exit(1);
}

fn cmd_status() {
    let config = load_config();

    println!("Motion Sensor Agent Status");
    println!("==========================");
    println!();

    println!("Configuration:");
    println!(
        "  Sampling: {} Hz, window {} samples",
        config.sampling.sample_rate_hz, config.sampling.window_len
    );
    println!(
        "  Energy threshold: {}",
        config.detection.energy_threshold
    );
    println!(
        "  Gateway: {}:{} (topic {})",
        config.transport.host, config.transport.port, config.transport.publish_topic
    );
    println!();

    let stats_path = config.data_path.join("telemetry.json");
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("samples_acquired", "Samples acquired"),
                    ("cycles_completed", "Cycles completed"),
                    ("cycles_aborted", "Cycles aborted"),
                    ("sample_overruns", "Late samples"),
                    ("threshold_crossings", "Threshold crossings"),
                    ("events_published", "Events published"),
                    ("events_dropped", "Events dropped"),
                    ("publish_failures", "Publish failures"),
                    ("spectrum_truncations", "Spectrum truncations"),
                    ("mode_toggles", "Mode toggles"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
                if let Some(rate) = stats
                    .get("last_cycle")
                    .and_then(|c| c.get("timing"))
                    .and_then(|t| t.get("achieved_rate_hz"))
                    .and_then(|r| r.as_f64())
                {
                    println!("  Last achieved rate: {rate:.1} Hz");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
