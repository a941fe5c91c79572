// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod categorize;
pub mod chunk;
pub mod content;
pub mod dedup;
pub mod normalize;
pub mod pattern;
pub mod payment_text;
pub mod rules;

pub use categorize::{CategorizeError, CategoryAssigner, RULE_CONFIDENCE_CAP};
pub use chunk::{chunk_text, TextChunk};
pub use content::{ContentCategorizer, ContentRule, OTHERS, PERSONAL_TRANSFER};
pub use dedup::{dedup_key, dedupe, DedupOutcome};
pub use normalize::{normalize, normalize_with_report, NormalizedText};
pub use pattern::{AmountOrder, PatternExtractor, PatternProfile};
pub use payment_text::clean_payment_text;
pub use rules::{KeywordRule, KeywordRules, RulesError};
