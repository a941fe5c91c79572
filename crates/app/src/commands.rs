use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use passbook_ai::GeminiClient;
use passbook_core::StatementStore;
use passbook_import::{CategoryAssigner, ContentCategorizer};
use passbook_ocr::{default_backend, Acquirer, RawDocument};
use passbook_pipeline::{learn_correction, PipelineConfig, StatementPipeline};
use passbook_storage::{MemoryStore, SqliteStore};
use serde_json::json;
use tracing::{info, warn};

async fn open_store(db: &Path) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(db)
        .await
        .with_context(|| format!("Failed to open database {}", db.display()))?;
    store.seed_defaults().await.context("Failed to seed default categories")?;
    Ok(store)
}

pub async fn import(
    file: &Path,
    user: &str,
    account: Option<&str>,
    config: Option<&Path>,
    db: Option<&Path>,
    preview: usize,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let rules = config.keyword_rules().context("Failed to load keyword rules")?;

    let store: Arc<dyn StatementStore> = match db {
        Some(path) => Arc::new(open_store(path).await?),
        None => {
            info!("No database given, results are kept in memory");
            Arc::new(MemoryStore::with_defaults())
        }
    };

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let doc = RawDocument::new(name, bytes);

    let acquirer = Acquirer::pdf(Arc::from(default_backend("eng")));
    let mut pipeline = StatementPipeline::new(acquirer, store, config.clone())
        .with_assigner(CategoryAssigner::new(rules));
    match GeminiClient::from_env(&config.ai) {
        Ok(client) => {
            let client = Arc::new(client);
            pipeline = pipeline.with_completion(client.clone()).with_vision(client);
        }
        Err(e) => warn!(error = %e, "AI tier disabled"),
    }

    let output = pipeline.process(&doc, user, account).await?;
    let shown: Vec<_> = output.transactions.iter().take(preview).collect();
    let report = json!({
        "metadata": output.metadata,
        "preview": shown,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn categorize(text: &str) -> anyhow::Result<()> {
    println!("{}", ContentCategorizer::default().categorize(text));
    Ok(())
}

pub async fn learn(user: &str, narration: &str, category: &str, db: &Path) -> anyhow::Result<()> {
    let store = open_store(db).await?;
    let record = learn_correction(&store, user, narration, category).await?;
    println!(
        "Learned \"{}\" -> {} ({} hit{})",
        record.pattern,
        record.category_id,
        record.hits,
        if record.hits == 1 { "" } else { "s" }
    );
    Ok(())
}

pub async fn seed(db: &Path) -> anyhow::Result<()> {
    let store = open_store(db).await?;
    let count = store.find_user_categories("").await?.len();
    println!("Database ready at {} with {count} shared categories", db.display());
    Ok(())
}
