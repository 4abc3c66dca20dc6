use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use store_indexer::cli::{self, Cli};
use store_indexer::{logging, SyncConfig};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    logging::init(config.log_format);

    let mut stdout = io::stdout();
    match cli::run(&cli.command, &config, &mut stdout).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Store indexer failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
