use std::process::ExitCode;

use clap::Parser;

use conntrackd_daemon::cli::DaemonCli;
use conntrackd_daemon::{config, logging, service};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    // Configuration and initialization errors abort startup on stderr.
    let config = match config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    if cli.validate {
        println!("configuration OK");
        return ExitCode::SUCCESS;
    }

    if let Err(err) = logging::init_tracing(&config.log_level, &config.log_format) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    match service::run(config).await {
        // Clean, signal-initiated shutdown.
        Ok(true) => ExitCode::SUCCESS,
        // Failure-induced shutdown (fatal listener error mid-run).
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            let reason = format!("{err:#}");
            tracing::error!(error = %reason, "fatal error");
            ExitCode::FAILURE
        }
    }
}
