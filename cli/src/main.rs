mod args;
mod errors;
mod evaluator;
mod sign_cmd;
mod verify_cmd;

use clap::Parser;

use args::{Cli, Commands};
use errors::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = laut_tracing::TracingBuilder::default()
        .level(cli.log_level)
        .build()
    {
        eprintln!("failed to initialize logging: {e}");
    }

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "laut failed");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<i32, CliError> {
    match &cli.command {
        Commands::Sign(args) => sign_cmd::run(args, &cli.evaluator).await,
        Commands::Verify(args) => verify_cmd::run(args, &cli.evaluator, &cli.store_root).await,
    }
}
