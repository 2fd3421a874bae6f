pub mod boundaries;
pub mod config;
pub mod coverage;
pub mod data;
pub mod filter;
pub mod geocode;
pub mod kpi;
pub mod server;
pub mod style;
pub mod types;
pub mod view;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import and geocode the raw customer export
    Import {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the dashboard API and static assets
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Import { config } => {
            println!("Importing customers with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            data::import_customers(&app_config).await?;
        }
        Commands::Serve { config } => {
            println!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let customers = data::load_customers(&app_config.output.customers_json)?;
            let boundaries = boundaries::StateBoundaries::load(&app_config.input.boundaries)?;

            server::start_server(app_config, customers, boundaries).await?;
        }
    }

    Ok(())
}
