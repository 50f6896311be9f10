//! MidiFX GW - command-line front end
//!
//! Drives outboard MIDI effects from the persisted device model: activate
//! effects, change settings, reset devices to defaults.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use midifx_gw::paths::AppPaths;
use midifx_gw::{
    ActivationOutcome, AppConfig, ControlChangeMessage, ControlError, ErrorCategory, MidiFxController,
    RequestContext, ResetOutcome, ResetReport, SetSettingRequest,
};

/// MidiFX Gateway - control MIDI effects hardware from a persisted device model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MIDIFX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Directory for the daily rolling JSON log (defaults to the app's logs directory)
    #[arg(long, env = "MIDIFX_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long)]
    no_log_file: bool,

    /// Correlation id for this request (random when omitted)
    #[arg(long)]
    correlation_id: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available MIDI output ports
    Ports,

    /// Restore every effect and setting of a device to its defaults
    Reset { device: String },

    /// Turn an effect on (or off with --off)
    Activate {
        device: String,
        effect: String,
        #[arg(long)]
        off: bool,
    },

    /// Change a setting by raw value or by selection name
    Set {
        device: String,
        effect: String,
        setting: String,
        #[arg(long, conflicts_with = "selection")]
        value: Option<i32>,
        #[arg(long)]
        selection: Option<String>,
    },

    /// Send a raw Control-Change message without touching the store
    Send {
        connect_name: String,
        address: i32,
        value: i32,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();
    let log_dir = match (args.no_log_file, &args.log_dir) {
        (true, _) => None,
        (false, Some(dir)) => Some(dir.clone()),
        (false, None) => Some(paths.logs_dir.clone()),
    };
    let _log_guard = init_logging(&args.log_level, args.log_format, log_dir.as_deref())?;

    info!("Starting MidiFX GW v{}...", env!("CARGO_PKG_VERSION"));
    info!(
        "Data directory: {} ({} mode)",
        paths.base_dir().display(),
        if paths.is_portable { "portable" } else { "installed" }
    );

    let config = load_config(args.config.as_deref(), &paths).await?;
    let controller = MidiFxController::from_config(&config);

    let ctx = match &args.correlation_id {
        Some(id) => RequestContext::with_correlation_id(id.clone()),
        None => RequestContext::new(),
    };
    let token = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, cancelling");
            token.cancel();
        }
    });

    let result = run(&controller, &ctx, args.command, args.json).await;
    controller.shutdown();

    match result {
        Ok(code) => Ok(code),
        Err(e) => {
            eprintln!("{} {}", format!("[{}]", e.category()).red().bold(), e);
            if e.is_fatal() {
                eprintln!("{}", "Device and store disagree: operator action required".red());
            }
            Ok(ExitCode::from(exit_code(e.category())))
        }
    }
}

async fn run(
    controller: &MidiFxController,
    ctx: &RequestContext,
    command: Command,
    json: bool,
) -> Result<ExitCode, ControlError> {
    match command {
        Command::Ports => {
            let ports = controller.list_ports().map_err(|source| ControlError::DeviceUnreachable {
                device: "-".to_string(),
                operation: "port enumeration".to_string(),
                source,
            })?;
            print_ports(&ports);
        }
        Command::Reset { device } => {
            let report = controller.reset_device(ctx, &device).await?;
            print_report(&report, json);
            if report.outcome() == ResetOutcome::PartialFailure {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Activate { device, effect, off } => {
            match controller.activate_effect(ctx, &device, &effect, !off).await? {
                ActivationOutcome::Applied(message) => print_sent(&message, json),
                ActivationOutcome::NothingToSend => {
                    println!("{}", format!("Nothing to send for '{}'", effect).dimmed())
                }
            }
        }
        Command::Set {
            device,
            effect,
            setting,
            value,
            selection,
        } => {
            let request = SetSettingRequest {
                device,
                effect,
                setting,
                value,
                selection,
            };
            let message = controller.set_setting(ctx, &request).await?;
            print_sent(&message, json);
        }
        Command::Send {
            connect_name,
            address,
            value,
        } => {
            let message = ControlChangeMessage::new(address, value);
            controller.send_raw(ctx, &connect_name, message).await?;
            print_sent(&message, json);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = paths.config.clone();
            if !path.exists() {
                warn!("No config file at {}, using defaults", path.display());
                return Ok(AppConfig::default());
            }
            path
        }
    };

    info!("Configuration file: {}", path.display());
    AppConfig::load(&path).await
}

fn exit_code(category: ErrorCategory) -> u8 {
    match category {
        ErrorCategory::NotFound => 3,
        ErrorCategory::BadRequest => 4,
        ErrorCategory::DeviceUnreachable => 5,
        ErrorCategory::RecoverableError => 6,
        ErrorCategory::FatalInconsistency => 7,
        ErrorCategory::StoreUnavailable => 8,
    }
}

fn print_ports(ports: &[String]) {
    println!("\n{}", "=== Available MIDI Output Ports ===".bold().cyan());
    if ports.is_empty() {
        println!("  {}", "No output ports found".dimmed());
    }
    for port in ports {
        println!("  {}", port);
    }
}

fn print_sent(message: &ControlChangeMessage, json: bool) {
    if json {
        println!("{}", serde_json::to_string(message).unwrap_or_default());
    } else {
        println!("{} {}", "✅ Sent".green(), message.to_string().bright_white());
    }
}

fn print_report(report: &ResetReport, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        return;
    }

    let status = match report.outcome() {
        ResetOutcome::Success => "SUCCESS".green().bold(),
        ResetOutcome::PartialFailure => "PARTIAL FAILURE".yellow().bold(),
    };
    println!("\n{} {}", "Reset".bold(), report.device.bright_white());
    println!("  Status:  {}", status);
    println!("  Applied: {}", report.applied.to_string().green());
    println!("  Skipped: {}", report.skipped.to_string().dimmed());
    if report.cancelled {
        println!("  {}", "Cancelled before the walk finished".yellow());
    }
    for failure in &report.failures {
        let item = match &failure.setting {
            Some(setting) => format!("{}/{}", failure.effect, setting),
            None => failure.effect.clone(),
        };
        println!("  {} {} [{}] {}", "✗".red(), item.yellow(), failure.category, failure.message);
    }
}

/// Console logging plus an optional JSON file; the guard must live until exit.
///
/// A log directory that cannot be used only costs the file output.
fn init_logging(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let appender = log_dir.and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("midifx-gw")
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| eprintln!("[logging] No log file in {}: {}", dir.display(), e))
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(guard)
}
