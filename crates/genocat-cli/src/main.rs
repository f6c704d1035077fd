//! Genocat CLI entry point.
//!
//! Exit codes: 0 success, 1 malformed arguments or unknown subcommand,
//! 2 permission denied, 3 not found, 4 lock or concurrency conflict,
//! 5 internal.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version output are not argument errors.
            if e.use_stderr() {
                eprintln!("{e}");
                std::process::exit(1);
            }
            print!("{e}");
            std::process::exit(0);
        }
    };

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {e}");
        std::process::exit(e.kind.exit_code());
    }
}
