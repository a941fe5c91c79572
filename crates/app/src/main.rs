use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import { file, user, account, config, db, preview } => {
            commands::import(&file, &user, account.as_deref(), config.as_deref(), db.as_deref(), preview).await
        }
        Commands::Categorize { text } => commands::categorize(&text),
        Commands::Learn { user, narration, category, db } => {
            commands::learn(&user, &narration, &category, &db).await
        }
        Commands::Seed { db } => commands::seed(&db).await,
    }
}
