//! bc-keytool entry point

use bc_keytool::runner::block_on_detached;
use bc_keytool::{Cli, ExitCode, KeytoolConfig};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Only the default location gets a generated file.
    if cli.config.is_none() {
        if let Err(e) = KeytoolConfig::create_default_if_missing() {
            eprintln!("Warning: Could not create default config: {e}");
        }
    }

    let config = match KeytoolConfig::resolve(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Config error: {e}");
            return ExitCode::GeneralError.to_exit_code();
        }
    };

    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match block_on_detached(cli.execute_with_config(config)) {
        Ok(Ok(code)) => code.to_exit_code(),
        Ok(Err(e)) => {
            eprintln!("Error: {e:#}");
            ExitCode::GeneralError.to_exit_code()
        }
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            ExitCode::GeneralError.to_exit_code()
        }
    }
}
