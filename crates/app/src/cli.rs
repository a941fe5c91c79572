use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "passbook", about = "Turn bank and payment-app statements into categorized transactions.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract, categorize and save the transactions in a statement PDF.
    Import {
        /// Statement file (PDF)
        file: PathBuf,
        /// Owner of the transactions; scopes categories and learning
        #[arg(long)]
        user: String,
        /// Account name recorded on saved transactions
        #[arg(long)]
        account: Option<String>,
        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite database; without it results are kept in memory only
        #[arg(long)]
        db: Option<PathBuf>,
        /// Number of transactions to print
        #[arg(long, default_value_t = 10)]
        preview: usize,
    },
    /// Classify free text with the content categorizer.
    Categorize {
        text: String,
    },
    /// Record a manual category correction for a narration.
    Learn {
        #[arg(long)]
        user: String,
        #[arg(long)]
        narration: String,
        /// Category id, e.g. `food`
        #[arg(long)]
        category: String,
        #[arg(long)]
        db: PathBuf,
    },
    /// Create the database and the default categories.
    Seed {
        #[arg(long)]
        db: PathBuf,
    },
}
