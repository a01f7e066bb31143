//! arcall - AR video call pipeline
//!
//! Entry point for the demo binary. Runs the full pipeline against the
//! synthetic camera, the software effect engine, and the loopback
//! transport, with a scripted pair of remote participants.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use arcall::call::{CallSessionController, CallState, PipelineParts, SessionNotification};
use arcall::capture::{CameraSource, SyntheticCamera};
use arcall::config::Config;
use arcall::effect::OverlayEngine;
use arcall::render::CpuBackend;
use arcall::transport::{LeaveReason, LoopbackTransport, ParticipantId, TransportEvent};
use arcall::utils::{format_user_error, log_session_summary, log_startup_diagnostics};

/// Interval between scripted participant events
const SCRIPT_STEP: Duration = Duration::from_secs(2);

/// Command-line arguments for arcall
#[derive(Parser, Debug)]
#[command(name = "arcall")]
#[command(version, about = "AR video call pipeline", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.config/arcall/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Channel to join
    #[arg(long, env = "ARCALL_CHANNEL")]
    pub channel: Option<String>,

    /// Maximum number of views including the local one
    #[arg(long)]
    pub max_views: Option<usize>,

    /// Seconds to stay in the call (0 = until Ctrl-C)
    #[arg(short, long, default_value = "10")]
    pub duration: u64,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Save the last exported frame as PNG before leaving
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(Config::default_path);
    let loaded = match &config_path {
        Some(path) => Config::load(path),
        None => Err(anyhow::anyhow!("No config directory available")),
    };
    let base = loaded.as_ref().ok().cloned().unwrap_or_default();

    let _log_guard = init_logging(&args, &base)?;

    info!("════════════════════════════════════════════════════════");
    info!("  arcall v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("════════════════════════════════════════════════════════");

    if let Err(e) = &loaded {
        warn!("Failed to load config: {:#}, using defaults", e);
    }

    let config = base.with_overrides(args.channel.clone(), args.max_views);
    if let Err(e) = config.validate() {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    log_startup_diagnostics(&config);

    if let Err(e) = run(&args, config).await {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("arcall shut down");
    Ok(())
}

async fn run(args: &Args, config: Config) -> Result<()> {
    let transport = Arc::new(LoopbackTransport::new(Duration::from_millis(
        config.transport.join_latency_ms,
    )));
    let parts = PipelineParts {
        source: Box::new(CameraSource::new(SyntheticCamera::new(&config.capture))),
        effect: Arc::new(OverlayEngine::new(Duration::from_millis(
            config.effect.init_delay_ms,
        ))),
        backend: Box::new(CpuBackend::new()),
        transport: transport.clone(),
    };
    let export_metrics = config.logging.metrics;

    let mut controller =
        CallSessionController::new(config, parts).context("Failed to create call session")?;
    let notifications = controller.subscribe();

    controller.start().context("Failed to start pipeline")?;
    controller.join_call().context("Failed to join call")?;

    let mut script = demo_script().into_iter();
    let mut step = tokio::time::interval(SCRIPT_STEP);
    step.tick().await;

    let deadline = tokio::time::sleep(if args.duration == 0 {
        Duration::MAX / 4
    } else {
        Duration::from_secs(args.duration)
    });
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            message = controller.next_control() => match message {
                Some(message) => controller.handle_control(message),
                None => {
                    warn!("Control queue closed");
                    break;
                }
            },
            _ = step.tick() => {
                if controller.state() == CallState::Active {
                    if let Some(event) = script.next() {
                        transport.inject(event);
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, leaving call");
                break;
            }
            _ = &mut deadline => {
                info!("Call duration reached");
                break;
            }
        }

        for notification in notifications.try_iter() {
            log_notification(&notification);
        }
    }

    if let Some(path) = &args.snapshot {
        match transport.take_last_frame() {
            Some(frame) => {
                frame
                    .save_png(path)
                    .with_context(|| format!("Failed to save snapshot: {}", path.display()))?;
                info!(path = %path.display(), sequence = frame.sequence, "Snapshot saved");
            }
            None => warn!("No frame was exported, snapshot skipped"),
        }
    }

    if controller.state() != CallState::Idle {
        controller.end_call().context("Failed to end call")?;
    }
    let stats = controller.stats();
    controller.teardown();

    log_session_summary(&stats, controller.metrics());
    if export_metrics {
        match controller.metrics().export_json() {
            Ok(json) => debug!("Metrics: {}", json),
            Err(e) => warn!("Failed to export metrics: {}", e),
        }
    }

    Ok(())
}

fn demo_script() -> Vec<TransportEvent> {
    vec![
        TransportEvent::RemoteFrameFirstDecoded {
            participant: ParticipantId(7),
            width: 480,
            height: 480,
        },
        TransportEvent::RemoteFrameFirstDecoded {
            participant: ParticipantId(8),
            width: 640,
            height: 480,
        },
        TransportEvent::ParticipantLeft {
            participant: ParticipantId(7),
            reason: LeaveReason::Timeout,
        },
        TransportEvent::ParticipantLeft {
            participant: ParticipantId(8),
            reason: LeaveReason::Quit,
        },
    ]
}

fn log_notification(notification: &SessionNotification) {
    match notification {
        SessionNotification::StateChanged { from, to } => info!("Call state: {} → {}", from, to),
        SessionNotification::ViewsChanged { slots, layout } => {
            let views: Vec<String> = slots
                .iter()
                .map(|slot| match slot.source.participant() {
                    Some(participant) => participant.to_string(),
                    None => "local".to_string(),
                })
                .collect();
            info!(
                "Views: [{}] (slot fraction {:.2})",
                views.join(", "),
                layout.slot_fraction
            );
        }
        SessionNotification::Warning(e) => warn!("{}", e),
        SessionNotification::FaceVisibility(visible) => {
            info!("Face {}", if *visible { "detected" } else { "lost" })
        }
        SessionNotification::EffectActive(effect) => info!("Effect active: {}", effect),
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<Option<WorkerGuard>> {
    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("arcall={},warn", log_level)));

    let mut layers = vec![fmt_layer(&args.log_format, std::io::stdout, true)];

    if let Some(log_file_path) = &args.log_file {
        let file = std::fs::File::create(log_file_path)
            .with_context(|| format!("Failed to create log file: {}", log_file_path.display()))?;
        layers.push(fmt_layer(&args.log_format, Mutex::new(file), false));
    }

    let guard = match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "arcall.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt_layer(&args.log_format, writer, false));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(log_file_path) = &args.log_file {
        info!("Logging to file: {}", log_file_path.display());
    }
    if let Some(dir) = &config.logging.log_dir {
        info!("Logging to directory: {}", dir.display());
    }

    Ok(guard)
}

fn fmt_layer<W>(format: &str, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ if ansi => layer.pretty().boxed(),
        _ => layer.boxed(),
    }
}
