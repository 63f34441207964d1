use clap::Parser;
use sidekey::cli::{self, Cli, Commands};
use sidekey::config::Config;
use tracing::debug;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    debug!(data_dir = %config.data_dir().display(), "sidekey starting");

    let result = match &cli.command {
        Commands::Connect(args) => cli::connect::execute(&config, args).await,
        Commands::Import(args) => cli::import::execute(&config, args),
        Commands::Trade(args) => cli::trade::execute(&config, args).await,
        Commands::Orders(args) => cli::orders::execute(&config, args).await,
        Commands::Balance(args) => cli::balance::execute(&config, args).await,
    };

    if let Err(e) = result {
        cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
