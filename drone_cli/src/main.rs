use clap::Parser;
use drone_cli::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // JSON logs by default; DRONE_LOG_FORMAT=text for human-readable output.
    drone_core::o11y::init_global_from_env()?;
    let cli = Cli::parse();
    drone_cli::commands::run(cli).await
}
