use std::{io, process};

use clap::Parser;
use log::info;

mod cli;
mod import;
mod train;

use cli::{Cli, Command};
use train::Outcome;

/// Exit status of a run stopped by ctrl-c.
const INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => {
            if let Outcome::Interrupted = train::train(args).await? {
                info!("metrics flushed, exiting");
                process::exit(INTERRUPTED);
            }
        }
        Command::Import(args) => {
            let n = tokio::task::spawn_blocking(move || import::import(&args))
                .await
                .map_err(io::Error::other)??;
            info!("stored {n} iterations");
        }
        Command::Cells(args) => {
            let n = tokio::task::spawn_blocking(move || import::import_cells(&args))
                .await
                .map_err(io::Error::other)??;
            info!("stored {n} cells");
        }
    }

    Ok(())
}
