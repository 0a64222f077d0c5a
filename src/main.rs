mod cli;
mod comparison;
mod error;
mod format;
mod model;
mod orchestrator;
mod storage;
mod text_summary;
mod timer;
#[cfg(feature = "tui")]
mod tui;
mod wizard;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.text || args.is_one_shot();

    match cli::run(args).await {
        Ok(()) => {
            // The line-mode stdin reader may still be parked in a blocking read.
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "exiting with error");
            Err(e)
        }
    }
}
