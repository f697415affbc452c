use anyhow::{Context, Result};
use clap::Parser;

use salescope::cli::Cli;
use salescope::config_file::ConfigFile;
use salescope::platform::{ExitCode, SafeStdout, SignalHandler};
use salescope::report;
use salescope::{Analytics, CancelToken, EngineConfig, EngineError};

fn init_logging(cli: &Cli) {
    // RUST_LOG wins over --log-level when both are present
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.as_str()),
    );
    builder.format_timestamp(None);
    builder.target(env_logger::Target::Stderr).init();
}

/// Engine configuration from defaults, config files and flags, in that order
fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    let file_config = ConfigFile::load_with_custom_path(cli.config.as_deref())
        .context("Failed to load configuration")?;
    Ok(cli.apply_overrides(file_config.apply(EngineConfig::default())))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.show_config {
        ConfigFile::show_config(cli.config.as_deref());
        ExitCode::Success.exit();
    }

    let Some(path) = cli.file.clone() else {
        eprintln!("salescope: Error: no input file given");
        ExitCode::InvalidUsage.exit();
    };

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("salescope: Error: {:#}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let analytics = match Analytics::with_config(config) {
        Ok(analytics) => analytics,
        Err(e) => {
            eprintln!("salescope: Error: {}", e);
            ExitCode::InvalidUsage.exit();
        }
    };

    let cancel = CancelToken::new();
    let _signal_handler = match SignalHandler::new(cancel.clone()) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("Failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let load = match analytics.load_from_csv(&path, &cancel) {
        Ok(load) => load,
        Err(EngineError::Cancelled) => {
            eprintln!("salescope: Processing interrupted");
            ExitCode::SignalInt.exit();
        }
        Err(e) => {
            eprintln!("salescope: Error: {:#}", anyhow::Error::new(e));
            ExitCode::GeneralError.exit();
        }
    };

    let rendered = report::render(&analytics, Some(&load), &cli.report_options())?;
    let mut stdout = SafeStdout::new();
    if let Err(e) = stdout.write_str(&rendered) {
        eprintln!("salescope: Error: {}", e);
        ExitCode::GeneralError.exit();
    }

    ExitCode::Success.exit();
}
