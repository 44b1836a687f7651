//! zapgpt - WhatsApp assistant answering through an OpenAI-compatible API.

use clap::Parser;
use std::process::ExitCode;

use zapgpt::cli::Commands;

#[tokio::main]
async fn main() -> ExitCode {
    // The guard flushes the log file on exit.
    let _log_guard = match zapgpt::logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
