use anyhow::Result;
use cafe_ledger::bootstrap::init_tracing;
use cafe_ledger::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.run().await
}
