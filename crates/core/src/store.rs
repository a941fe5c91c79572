use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::category::{Category, LearningRecord};
use super::money::Money;
use super::transaction::{TxnType, ValidatedTransaction};

/// Longest title derived from a narration, in characters.
pub const TITLE_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Record rejected: {0}")]
    Rejected(String),
}

/// A transaction ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub account: Option<String>,
    pub title: String,
    pub narration: String,
    pub date: String,
    pub amount: Money,
    pub txn_type: TxnType,
    pub category_id: Option<String>,
    pub confidence: f32,
    pub source: String,
    pub import_batch: String,
}

impl NewTransaction {
    /// Build a record from a validated candidate. Returns `None` when the
    /// candidate lacks an amount or direction.
    pub fn from_validated(
        tx: &ValidatedTransaction,
        user_id: &str,
        account: Option<&str>,
        import_batch: &str,
    ) -> Option<Self> {
        let c = &tx.candidate;
        Some(Self {
            user_id: user_id.to_string(),
            account: c.account.clone().or_else(|| account.map(str::to_string)),
            title: c.narration.trim().chars().take(TITLE_LEN).collect(),
            narration: c.narration.clone(),
            date: c.date.clone(),
            amount: c.amount?,
            txn_type: c.txn_type?,
            category_id: c.category.as_ref().map(|a| a.category_id.clone()),
            confidence: c.confidence,
            source: "pdf".to_string(),
            import_batch: import_batch.to_string(),
        })
    }
}

/// Persistence the extraction pipeline reads from and writes to.
#[async_trait]
pub trait StatementStore: Send + Sync {
    async fn find_user_categories(&self, user_id: &str) -> Result<Vec<Category>, StoreError>;

    async fn find_learning_pattern(
        &self,
        user_id: &str,
        pattern: &str,
    ) -> Result<Option<LearningRecord>, StoreError>;

    /// Insert the pattern with one hit, or point it at `category_id` and add a hit.
    async fn upsert_learning_pattern(
        &self,
        user_id: &str,
        pattern: &str,
        category_id: &str,
    ) -> Result<LearningRecord, StoreError>;

    /// Returns the new record's id.
    async fn create_transaction(&self, record: &NewTransaction) -> Result<i64, StoreError>;
}
