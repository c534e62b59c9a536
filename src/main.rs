use clap::Parser;
use proxy_supervisor::cli::{init_tracing, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose());

    cli.execute().await?;
    Ok(())
}
