use anyhow::Result;
use cagnotte::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    cagnotte::init_tracing();
    let cli = Cli::parse();
    cli.run().await
}
