use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use passbook_core::{
    default_categories, Category, LearningRecord, NewTransaction, StatementStore, StoreError,
};

#[derive(Default)]
struct State {
    categories: Vec<(Option<String>, Category)>,
    learning: HashMap<(String, String), LearningRecord>,
    transactions: Vec<NewTransaction>,
}

/// In-process [`StatementStore`] for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    reject_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the built-in shared categories.
    pub fn with_defaults() -> Self {
        let store = Self::new();
        store.lock().categories = default_categories().into_iter().map(|c| (None, c)).collect();
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_user_category(&self, user_id: &str, category: Category) {
        self.lock().categories.push((Some(user_id.to_string()), category));
    }

    /// Make every subsequent `create_transaction` fail.
    pub fn reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }

    pub fn transactions(&self) -> Vec<NewTransaction> {
        self.lock().transactions.clone()
    }

    pub fn learning(&self, user_id: &str, pattern: &str) -> Option<LearningRecord> {
        self.lock().learning.get(&(user_id.to_string(), pattern.to_string())).cloned()
    }
}

#[async_trait]
impl StatementStore for MemoryStore {
    async fn find_user_categories(&self, user_id: &str) -> Result<Vec<Category>, StoreError> {
        let state = self.lock();
        let shared = state.categories.iter().filter(|(owner, _)| owner.is_none());
        let own = state.categories.iter().filter(|(owner, _)| owner.as_deref() == Some(user_id));
        Ok(shared.chain(own).map(|(_, c)| c.clone()).collect())
    }

    async fn find_learning_pattern(
        &self,
        user_id: &str,
        pattern: &str,
    ) -> Result<Option<LearningRecord>, StoreError> {
        Ok(self.learning(user_id, pattern))
    }

    async fn upsert_learning_pattern(
        &self,
        user_id: &str,
        pattern: &str,
        category_id: &str,
    ) -> Result<LearningRecord, StoreError> {
        let mut state = self.lock();
        let record = state
            .learning
            .entry((user_id.to_string(), pattern.to_string()))
            .and_modify(|r| {
                r.category_id = category_id.to_string();
                r.hits += 1;
                r.last_used = Utc::now();
            })
            .or_insert_with(|| LearningRecord {
                user_id: user_id.to_string(),
                pattern: pattern.to_string(),
                category_id: category_id.to_string(),
                hits: 1,
                last_used: Utc::now(),
            });
        Ok(record.clone())
    }

    async fn create_transaction(&self, record: &NewTransaction) -> Result<i64, StoreError> {
        if self.reject_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("saves disabled".to_string()));
        }
        if record.user_id.is_empty() {
            return Err(StoreError::Rejected("missing user id".to_string()));
        }
        let mut state = self.lock();
        state.transactions.push(record.clone());
        Ok(state.transactions.len() as i64)
    }
}
