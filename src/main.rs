mod boundaries;
mod catalog;
mod cli;
mod config;
mod dashboard;
mod db;
mod download;
mod parquet;
mod paths;
mod raster;
mod steps;
mod yearly;
mod zonal;

use std::env::{set_var, var};

use anyhow::Result;
use clap::Parser;
use cli::{command, Cli, Commands};
use config::read_config;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if var("RUST_LOG").is_err() {
        set_var("RUST_LOG", "info")
    }
    pretty_env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = read_config(&cli.config)?;

    match &cli.command {
        Commands::Run {
            selection,
            all_months,
        } => command::run(config, selection, *all_months).await?,
        Commands::Plan {
            selection,
            all_months,
        } => {
            for line in command::plan(&config, selection, *all_months)? {
                println!("{}", line);
            }
        }
        Commands::Boundaries {} => {
            let geojson = command::boundaries(&config).await?;
            println!("GeoJSON saved to `{}`", geojson.display());
        }
        Commands::Countries { csv } => {
            let inserted = command::countries(&config, csv).await?;
            println!("{} countries added", inserted);
        }
        Commands::Export { selection } => {
            let filename = command::export(&config, selection)?;
            println!("File saved to `{}`", filename);
        }
        Commands::Dashboard { product, port } => {
            command::dashboard(&config, product.as_deref(), *port).await?
        }
    }

    Ok(())
}
