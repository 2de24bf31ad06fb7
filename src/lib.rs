pub mod commands;
pub mod config;
pub mod errors;
pub mod measure;

use std::process::ExitCode;

use crate::commands::{Command, Outcome};
use crate::config::AppConfig;
use crate::errors::{Point2PointError, Point2PointResult};

/// Parse `std::env::args`, run the command and map the result to an exit
/// code: 0 on success or cancellation, 1 on failure, 2 on usage errors.
pub fn run() -> ExitCode {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match commands::parse_args(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("{e}\n");
            eprint!("{}", commands::USAGE);
            return ExitCode::from(2);
        }
    };

    // Config is read before logging is set up since it names the log level.
    let loaded = config::load_config();
    let level = loaded
        .as_ref()
        .map(|cfg| cfg.general.log_level.clone())
        .unwrap_or_else(|_| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = command.wants_json();
    let cfg = match config_for(&command, loaded) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config");
            report_error(&e, json);
            return ExitCode::from(exit_status(&e));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::execute(command, cfg)) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Cancelled) => {
            println!("cancelled");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_error(&e, json);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Config to run `command` with. A config that failed to load (bad file or
/// bad environment override) is fatal for commands that measure or convert;
/// the others fall back to defaults.
fn config_for(
    command: &Command,
    loaded: Point2PointResult<AppConfig>,
) -> Point2PointResult<AppConfig> {
    match loaded {
        Ok(cfg) => Ok(cfg),
        Err(e) if command.needs_config() => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "config unreadable; using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn exit_status(error: &Point2PointError) -> u8 {
    match error {
        Point2PointError::Usage(_) => 2,
        _ => 1,
    }
}

fn report_error(error: &Point2PointError, json: bool) {
    tracing::debug!(error = ?error, "command failed");
    if json {
        let body = serde_json::json!({ "error": error });
        println!("{body}");
    } else {
        eprintln!("error: {error}");
    }
}
