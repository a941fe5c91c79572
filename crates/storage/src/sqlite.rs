use std::path::Path;

use async_trait::async_trait;
use passbook_core::{Category, LearningRecord, NewTransaction, StatementStore, StoreError};
use tracing::debug;

use crate::db::{self, DbPool};

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// [`StatementStore`] over a SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) and migrate the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = db::create_db(path).await.map_err(backend)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn seed_defaults(&self) -> Result<(), StoreError> {
        db::seed_default_categories(&self.pool).await.map_err(backend)
    }

    pub async fn transactions_in_batch(&self, import_batch: &str) -> Result<Vec<NewTransaction>, StoreError> {
        db::get_transactions_by_batch(&self.pool, import_batch).await.map_err(backend)
    }
}

#[async_trait]
impl StatementStore for SqliteStore {
    async fn find_user_categories(&self, user_id: &str) -> Result<Vec<Category>, StoreError> {
        db::get_user_categories(&self.pool, user_id).await.map_err(backend)
    }

    async fn find_learning_pattern(
        &self,
        user_id: &str,
        pattern: &str,
    ) -> Result<Option<LearningRecord>, StoreError> {
        db::get_learning_pattern(&self.pool, user_id, pattern).await.map_err(backend)
    }

    async fn upsert_learning_pattern(
        &self,
        user_id: &str,
        pattern: &str,
        category_id: &str,
    ) -> Result<LearningRecord, StoreError> {
        let record = db::upsert_learning_pattern(&self.pool, user_id, pattern, category_id)
            .await
            .map_err(backend)?;
        debug!(user_id, pattern, hits = record.hits, "Learning pattern stored");
        Ok(record)
    }

    async fn create_transaction(&self, record: &NewTransaction) -> Result<i64, StoreError> {
        if record.user_id.is_empty() {
            return Err(StoreError::Rejected("missing user id".to_string()));
        }
        db::insert_transaction(&self.pool, record).await.map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbook_core::{CategoryKind, Money, TxnType};
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("passbook.db")).await.unwrap();
        store.seed_defaults().await.unwrap();
        (dir, store)
    }

    fn record(batch: &str) -> NewTransaction {
        NewTransaction {
            user_id: "u1".to_string(),
            account: Some("Kotak 0938".to_string()),
            title: "UPI/Zomato".to_string(),
            narration: "UPI/Zomato/Order 1234".to_string(),
            date: "2025-08-01".to_string(),
            amount: Money::parse("250.50").unwrap(),
            txn_type: TxnType::Debit,
            category_id: Some("food".to_string()),
            confidence: 0.95,
            source: "pdf".to_string(),
            import_batch: batch.to_string(),
        }
    }

    #[tokio::test]
    async fn seeded_categories_are_shared() {
        let (_dir, store) = store().await;
        let cats = store.find_user_categories("anyone").await.unwrap();
        assert_eq!(cats.len(), passbook_core::DEFAULT_CATEGORIES.len());
        assert_eq!(cats[0].id, "food");

        // seeding twice is harmless
        store.seed_defaults().await.unwrap();
        assert_eq!(store.find_user_categories("anyone").await.unwrap().len(), cats.len());
    }

    #[tokio::test]
    async fn user_categories_are_private() {
        let (_dir, store) = store().await;
        let pets = Category::new("u1-pets", "Pets", CategoryKind::Expense);
        db::insert_user_category(store.pool(), "u1", &pets).await.unwrap();

        let mine = store.find_user_categories("u1").await.unwrap();
        assert_eq!(mine.last().unwrap(), &pets);
        let theirs = store.find_user_categories("u2").await.unwrap();
        assert!(!theirs.contains(&pets));
    }

    #[tokio::test]
    async fn learning_upsert_increments_hits() {
        let (_dir, store) = store().await;
        assert!(store.find_learning_pattern("u1", "zomato").await.unwrap().is_none());

        let first = store.upsert_learning_pattern("u1", "zomato", "food").await.unwrap();
        assert_eq!(first.hits, 1);
        let second = store.upsert_learning_pattern("u1", "zomato", "groceries").await.unwrap();
        assert_eq!(second.hits, 2);
        assert_eq!(second.category_id, "groceries");

        let found = store.find_learning_pattern("u1", "zomato").await.unwrap().unwrap();
        assert_eq!(found.hits, 2);
        assert!(store.find_learning_pattern("u2", "zomato").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transactions_round_trip_through_batch() {
        let (_dir, store) = store().await;
        let id = store.create_transaction(&record("batch-1")).await.unwrap();
        assert!(id > 0);
        store.create_transaction(&record("batch-2")).await.unwrap();

        let saved = store.transactions_in_batch("batch-1").await.unwrap();
        assert_eq!(saved, vec![record("batch-1")]);
    }

    #[tokio::test]
    async fn record_without_user_is_rejected() {
        let (_dir, store) = store().await;
        let mut r = record("b");
        r.user_id.clear();
        assert!(matches!(store.create_transaction(&r).await, Err(StoreError::Rejected(_))));
    }
}
