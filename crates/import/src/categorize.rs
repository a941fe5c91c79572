//! Layered category assignment: learned corrections, then keyword rules, then
//! a low-confidence fallback bucket.
//!
//! A learning hit returns immediately, so its `attempts` trail holds only the
//! learning entry. When learning misses, the trail records the miss, the rule
//! outcome, and (if reached) the fallback, in that order.

use passbook_core::{
    learning_pattern, Category, CategoryAssignment, CategoryAttempt, CategorySource, StatementStore,
    TxnType,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::rules::KeywordRules;

pub const LEARNING_BASE_CONFIDENCE: f32 = 0.6;
pub const LEARNING_HIT_BONUS: f32 = 0.05;
pub const LEARNING_CONFIDENCE_CAP: f32 = 0.95;
pub const NAME_MATCH_SCORE: f32 = 0.6;
pub const RULE_CONFIDENCE_CAP: f32 = 0.8;
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

const FALLBACK_NAMES: &[&str] = &["other", "misc", "uncategorized"];

#[derive(Debug, Error)]
pub enum CategorizeError {
    #[error("No categories available for user '{0}'")]
    NoCategories(String),
}

pub struct CategoryAssigner {
    rules: KeywordRules,
}

impl Default for CategoryAssigner {
    fn default() -> Self {
        Self::new(KeywordRules::default())
    }
}

impl CategoryAssigner {
    pub fn new(rules: KeywordRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &KeywordRules {
        &self.rules
    }

    pub async fn assign(
        &self,
        user_id: &str,
        narration: &str,
        txn_type: Option<TxnType>,
        categories: &[Category],
        store: &dyn StatementStore,
    ) -> Result<CategoryAssignment, CategorizeError> {
        if categories.is_empty() {
            return Err(CategorizeError::NoCategories(user_id.to_string()));
        }
        let pattern = learning_pattern(narration);
        let mut attempts = Vec::new();

        match store.find_learning_pattern(user_id, &pattern).await {
            Ok(Some(record)) => {
                let confidence = (LEARNING_BASE_CONFIDENCE + record.hits as f32 * LEARNING_HIT_BONUS)
                    .min(LEARNING_CONFIDENCE_CAP);
                attempts.push(CategoryAttempt {
                    source: CategorySource::Learning,
                    category_id: Some(record.category_id.clone()),
                    reason: format!(
                        "Matched user learning pattern \"{pattern}\" with {} hits",
                        record.hits
                    ),
                    score: confidence,
                });
                info!(user_id, pattern = %pattern, category_id = %record.category_id, confidence, "Category assignment (learning)");
                return Ok(CategoryAssignment {
                    category_id: record.category_id,
                    source: CategorySource::Learning,
                    confidence,
                    attempts,
                });
            }
            Ok(None) => attempts.push(CategoryAttempt {
                source: CategorySource::Learning,
                category_id: None,
                reason: "No learned pattern".to_string(),
                score: 0.0,
            }),
            Err(e) => {
                warn!(user_id, error = %e, "Learning lookup failed, continuing with rules");
                attempts.push(CategoryAttempt {
                    source: CategorySource::Learning,
                    category_id: None,
                    reason: format!("Lookup failed: {e}"),
                    score: 0.0,
                });
            }
        }

        self.assign_by_rules_into(user_id, &pattern, txn_type, categories, attempts)
    }

    /// Rule and fallback tiers only, for callers without a learning table.
    pub fn assign_by_rules(
        &self,
        narration: &str,
        txn_type: Option<TxnType>,
        categories: &[Category],
    ) -> Result<CategoryAssignment, CategorizeError> {
        if categories.is_empty() {
            return Err(CategorizeError::NoCategories(String::new()));
        }
        self.assign_by_rules_into("", &learning_pattern(narration), txn_type, categories, Vec::new())
    }

    fn assign_by_rules_into(
        &self,
        user_id: &str,
        pattern: &str,
        txn_type: Option<TxnType>,
        categories: &[Category],
        mut attempts: Vec<CategoryAttempt>,
    ) -> Result<CategoryAssignment, CategorizeError> {
        let pool = narrow_pool(categories, txn_type);

        if let Some((category, score)) = self.best_rule_match(pattern, &pool) {
            let confidence = score.min(RULE_CONFIDENCE_CAP);
            attempts.push(CategoryAttempt {
                source: CategorySource::Rule,
                category_id: Some(category.id.clone()),
                reason: "Matched rule-based keyword pattern".to_string(),
                score,
            });
            info!(user_id, pattern, category_id = %category.id, confidence, "Category assignment (rule)");
            return Ok(CategoryAssignment {
                category_id: category.id.clone(),
                source: CategorySource::Rule,
                confidence,
                attempts,
            });
        }
        attempts.push(CategoryAttempt {
            source: CategorySource::Rule,
            category_id: None,
            reason: "No keyword or category name matched".to_string(),
            score: 0.0,
        });

        let fallback = pool
            .iter()
            .find(|c| {
                let name = c.name.to_lowercase();
                FALLBACK_NAMES.iter().any(|f| name.contains(f))
            })
            .or_else(|| pool.first())
            .ok_or_else(|| CategorizeError::NoCategories(user_id.to_string()))?;

        attempts.push(CategoryAttempt {
            source: CategorySource::Fallback,
            category_id: Some(fallback.id.clone()),
            reason: "No strong match, using fallback category".to_string(),
            score: FALLBACK_CONFIDENCE,
        });
        info!(user_id, pattern, category_id = %fallback.id, "Category assignment (fallback)");
        Ok(CategoryAssignment {
            category_id: fallback.id.clone(),
            source: CategorySource::Fallback,
            confidence: FALLBACK_CONFIDENCE,
            attempts,
        })
    }

    /// Keyword rules first, then category names found in the narration.
    /// Only a strictly better score replaces the current best.
    fn best_rule_match<'a>(&self, pattern: &str, pool: &[&'a Category]) -> Option<(&'a Category, f32)> {
        let mut best: Option<(&'a Category, f32)> = None;

        for rule in self.rules.iter() {
            let Some(target) = pool.iter().copied().find(|c| rule.targets(&c.name)) else {
                continue;
            };
            if let Some(score) = rule.score(pattern) {
                if beats(best, score) {
                    best = Some((target, score));
                }
            }
        }

        for &category in pool {
            let name = category.name.to_lowercase();
            if !name.is_empty() && pattern.contains(&name) && beats(best, NAME_MATCH_SCORE) {
                best = Some((category, NAME_MATCH_SCORE));
            }
        }

        best
    }
}

fn beats(best: Option<(&Category, f32)>, score: f32) -> bool {
    best.map_or(true, |(_, s)| score > s)
}

/// Categories whose kind matches the transaction direction, or all of them
/// when none match or the direction is unknown.
fn narrow_pool(categories: &[Category], txn_type: Option<TxnType>) -> Vec<&Category> {
    let matching: Vec<&Category> = match txn_type {
        Some(t) => categories.iter().filter(|c| c.kind == t.category_kind()).collect(),
        None => Vec::new(),
    };
    if matching.is_empty() {
        categories.iter().collect()
    } else {
        matching
    }
}
