use anyhow::Result;
use clap::Parser;
use skipnet_sp::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skipnet_sp=info".parse()?),
        )
        .init();

    Cli::parse().run()
}
