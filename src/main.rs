//! pa-midi-ctl
//!
//! Control PulseAudio / PipeWire volumes by name from a MIDI controller.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pa_midi_ctl::config::AppConfig;
use pa_midi_ctl::executor::VolumeCommandExecutor;
use pa_midi_ctl::midi::{self, MidiEvent, MidiInputDevice};
use pa_midi_ctl::pulse::{AudioBackend, PactlBackend};
use pa_midi_ctl::registry::{run_refresh_worker, TargetRegistry};
use pa_midi_ctl::router::EventRouter;
use pa_midi_ctl::startup::{self, OutputPortStatus};
use pa_midi_ctl::{paths, sniffer};

/// Capacity of the MIDI event queue between the driver thread and the router
const MIDI_QUEUE_CAPACITY: usize = 1000;

/// Control PulseAudio volumes from a MIDI controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print incoming MIDI events instead of controlling volumes
    #[arg(long)]
    sniff: bool,

    /// pactl executable
    #[arg(long, env = "PACTL", default_value = "pactl")]
    pactl: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        sniffer::list_ports_formatted();
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(paths::default_config_path);
    info!("Configuration file: {}", config_path.display());

    let config = AppConfig::load(&config_path).await?;
    info!("Loaded {} MIDI action(s)", config.midi_actions.len());

    if args.sniff {
        let port = Some(config.input_midi_name.as_str()).filter(|p| !p.is_empty());
        return sniffer::run_cli_sniffer(port).await;
    }

    if let Err(e) = startup::require_input_port(&config.input_midi_name, || {
        (
            midi::list_input_ports().unwrap_or_default(),
            midi::list_output_ports().unwrap_or_default(),
        )
    }) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }

    check_output_port(&config.output_midi_name);

    let backend: Arc<dyn AudioBackend> = Arc::new(PactlBackend::new(args.pactl.clone()));
    run_app(config, backend, shutdown_signal()).await?;

    info!("pa-midi-ctl shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    backend: Arc<dyn AudioBackend>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Using audio backend: {}", backend.name());
    let registry = Arc::new(TargetRegistry::new(backend.clone()));

    // Subscribe before the initial refresh so no change slips in between
    let refresh_worker = match backend.subscribe().await {
        Ok(events) => Some(tokio::spawn(run_refresh_worker(registry.clone(), events))),
        Err(e) => {
            warn!(
                "Failed to subscribe to audio server notifications, \
                 names will not follow stream changes: {}",
                e
            );
            None
        }
    };

    match registry.refresh().await {
        Ok(snapshot) => info!(
            "Initial registry refresh complete (generation {})",
            snapshot.generation()
        ),
        Err(e) => warn!("Initial registry refresh failed, starting empty: {}", e),
    }

    let router = EventRouter::new(
        config.midi_actions,
        VolumeCommandExecutor::new(registry.clone(), backend.clone()),
    );

    let (midi_tx, mut midi_rx) = mpsc::channel::<MidiEvent>(MIDI_QUEUE_CAPACITY);
    let device = MidiInputDevice::open(&config.input_midi_name, midi_tx)
        .with_context(|| format!("Failed to open MIDI input '{}'", config.input_midi_name))?;
    info!("Listening on MIDI input '{}'", device.port_name());

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = midi_rx.recv() => match event {
                Some(event) => router.handle(&event).await,
                None => {
                    warn!("MIDI input closed");
                    break;
                }
            },

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    drop(device);
    if let Some(worker) = refresh_worker {
        worker.abort();
    }
    debug!("Refresh worker stopped");

    Ok(())
}

/// OutputMidiName is reserved; only check that it exists
fn check_output_port(name: &str) {
    if name.is_empty() {
        return;
    }

    let outs = match midi::list_output_ports() {
        Ok(outs) => outs,
        Err(e) => {
            warn!("Failed to list MIDI output ports: {}", e);
            return;
        }
    };

    match startup::output_port_status(name, &outs) {
        OutputPortStatus::Present(port) => {
            debug!("Output MIDI port '{}' present (unused)", port)
        }
        OutputPortStatus::Missing(name) => {
            warn!("Output MIDI port '{}' not found, ignoring", name)
        }
        OutputPortStatus::Unset => {}
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}
