mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod providers;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting ocorrencias-etl - dados.rio incidents per category");
    cli.execute().await?;

    Ok(())
}
