use anyhow::Result;
use clap::Parser;
use propchat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    propchat::run(args).await
}
