use passbook_core::{learning_pattern, LearningRecord, StatementStore};
use tracing::info;

use crate::error::PipelineError;

/// Record a user's manual category correction for `narration`.
///
/// The narration is reduced to its learning pattern and upserted with a hit
/// increment, so the next import files the same narration under
/// `category_id` ahead of every keyword rule.
pub async fn learn_correction(
    store: &dyn StatementStore,
    user_id: &str,
    narration: &str,
    category_id: &str,
) -> Result<LearningRecord, PipelineError> {
    let pattern = learning_pattern(narration);
    if pattern.is_empty() {
        return Err(PipelineError::EmptyPattern);
    }

    let categories = store.find_user_categories(user_id).await?;
    if !categories.iter().any(|c| c.id == category_id) {
        return Err(PipelineError::UnknownCategory(category_id.to_string()));
    }

    let record = store.upsert_learning_pattern(user_id, &pattern, category_id).await?;
    info!(user_id, pattern = %record.pattern, category_id, hits = record.hits, "Learned category correction");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbook_storage::MemoryStore;

    #[tokio::test]
    async fn repeat_corrections_accumulate_hits() {
        let store = MemoryStore::with_defaults();
        learn_correction(&store, "u1", "UPI/ZOMATO  Order", "food").await.unwrap();
        let record = learn_correction(&store, "u1", "upi/zomato order", "food").await.unwrap();
        assert_eq!(record.pattern, "upi/zomato order");
        assert_eq!(record.hits, 2);
    }

    #[tokio::test]
    async fn unknown_category_is_refused() {
        let store = MemoryStore::with_defaults();
        let err = learn_correction(&store, "u1", "ZOMATO", "takeaway").await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory(id) if id == "takeaway"));
        assert!(store.learning("u1", "zomato").is_none());
    }

    #[tokio::test]
    async fn blank_narration_is_refused() {
        let store = MemoryStore::with_defaults();
        assert!(matches!(
            learn_correction(&store, "u1", "   ", "food").await,
            Err(PipelineError::EmptyPattern)
        ));
    }
}
