mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tubefetch::{api, config::Config, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = Config::load(args.config)?;
            api::run(config, args.address).await?
        }
    }

    Ok(())
}
