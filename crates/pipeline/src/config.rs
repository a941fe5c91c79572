use std::path::{Path, PathBuf};

use passbook_ai::AiConfig;
use passbook_import::{KeywordRules, PatternProfile, RulesError};
use passbook_ocr::{AcquireConfig, PreprocessOptions, QualityGate, SourceDetector, DEFAULT_MARKERS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(String),
    #[error("Invalid keyword rules: {0}")]
    Rules(#[from] RulesError),
}

/// Everything a [`crate::StatementPipeline`] run is tuned by.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pattern-tier results below this count bring in the AI tier.
    pub escalation_threshold: usize,
    /// Narration characters that take part in the dedup key.
    pub dedup_prefix_len: usize,
    pub review_threshold: f32,
    /// Persist valid, non-review records. `false` is a dry run.
    pub save_results: bool,
    pub chunking: ChunkingConfig,
    pub acquisition: AcquisitionConfig,
    pub patterns: PatternProfile,
    pub ai: AiConfig,
    pub categories: CategoriesConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 5,
            dedup_prefix_len: 20,
            review_threshold: passbook_core::REVIEW_THRESHOLD,
            save_results: true,
            chunking: ChunkingConfig::default(),
            acquisition: AcquisitionConfig::default(),
            patterns: PatternProfile::default(),
            ai: AiConfig::default(),
            categories: CategoriesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 2000, overlap: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub min_text_chars: usize,
    pub max_control_ratio: f32,
    pub page_timeout_secs: u64,
    /// Lowercase tokens that mark a payment-app export.
    pub detector_markers: Vec<String>,
    pub preprocess: PreprocessOptions,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        let gate = QualityGate::default();
        Self {
            min_text_chars: gate.min_text_chars,
            max_control_ratio: gate.max_control_ratio,
            page_timeout_secs: AcquireConfig::default().page_timeout_secs,
            detector_markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            preprocess: PreprocessOptions::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn acquire_config(&self) -> AcquireConfig {
        AcquireConfig {
            gate: QualityGate {
                min_text_chars: self.min_text_chars,
                max_control_ratio: self.max_control_ratio,
            },
            page_timeout_secs: self.page_timeout_secs,
            preprocess: self.preprocess,
        }
    }

    pub fn detector(&self) -> SourceDetector {
        SourceDetector::new(self.detector_markers.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    /// Keyword-rules TOML replacing the built-in table.
    pub rules_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The configured keyword rules, or the built-in table.
    pub fn keyword_rules(&self) -> Result<KeywordRules, ConfigError> {
        match &self.categories.rules_path {
            Some(path) => Ok(KeywordRules::from_file(path)?),
            None => Ok(KeywordRules::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbook_core::DateOrder;
    use passbook_import::AmountOrder;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(PipelineConfig::from_toml("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            escalation_threshold = 3
            save_results = false

            [chunking]
            chunk_size = 1500

            [acquisition]
            min_text_chars = 120
            detector_markers = ["phonepe"]

            [patterns]
            amount_order = "balance_first"
            date_order = "month_first"

            [ai]
            model = "gemini-2.0-flash"
            vision_batch_size = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.escalation_threshold, 3);
        assert!(!config.save_results);
        assert_eq!(config.chunking, ChunkingConfig { chunk_size: 1500, overlap: 200 });
        assert_eq!(config.acquisition.acquire_config().gate.min_text_chars, 120);
        assert_eq!(config.acquisition.page_timeout_secs, 60);
        assert_eq!(config.patterns.amount_order, AmountOrder::BalanceFirst);
        assert_eq!(config.patterns.date_order, DateOrder::MonthFirst);
        assert_eq!(config.patterns.min_line_len, 20);
        assert_eq!(config.ai.model, "gemini-2.0-flash");
        assert_eq!(config.ai.vision_batch_size, 3);
        assert_eq!(config.ai.chunk_concurrency, 4);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = PipelineConfig::from_toml("escalation_threshold = \"many\"").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse TOML"));
    }

    #[test]
    fn keyword_rules_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "[[rule]]\nkey = \"pets\"\nkeywords = [\"petsmart\"]\n").unwrap();

        let config = PipelineConfig {
            categories: CategoriesConfig { rules_path: Some(path) },
            ..PipelineConfig::default()
        };
        let rules = config.keyword_rules().unwrap();
        assert_eq!(rules.iter().count(), 1);

        let missing = PipelineConfig {
            categories: CategoriesConfig { rules_path: Some(dir.path().join("nope.toml")) },
            ..PipelineConfig::default()
        };
        assert!(matches!(missing.keyword_rules(), Err(ConfigError::Rules(_))));
    }
}
