use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use passbook_ai::{AiExtractor, CompletionClient, VisionClient};
use passbook_core::{
    validate_all, DateOrder, LearningRecord, NewTransaction, StatementStore, TransactionCandidate,
    ValidatedTransaction,
};
use passbook_import::{
    chunk_text, clean_payment_text, dedupe, normalize_with_report, CategorizeError,
    CategoryAssigner, PatternExtractor, PatternProfile,
};
use passbook_ocr::{Acquirer, DocumentKind, ExtractionMethod, Probe, RawDocument};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::learning;

/// Density multiplier below one candidate per page.
const SPARSE_FACTOR: f32 = 0.7;
/// Density multiplier below three candidates per page.
const THIN_FACTOR: f32 = 0.85;

/// Which tiers produced the candidates of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    Regex,
    Llm,
    Hybrid,
    Vision,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStrategy::Regex => write!(f, "regex"),
            ExtractionStrategy::Llm => write!(f, "llm"),
            ExtractionStrategy::Hybrid => write!(f, "hybrid"),
            ExtractionStrategy::Vision => write!(f, "vision"),
        }
    }
}

/// Counts explaining how much a run recovered and by which strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetadata {
    pub total_found: usize,
    pub high_confidence_count: usize,
    /// Records routed to manual review.
    pub low_confidence_count: usize,
    pub invalid_count: usize,
    /// Text chunks or vision batches whose response decoded.
    pub chunks_parsed: usize,
    pub time_taken_ms: u64,
    pub method: ExtractionStrategy,
    pub saved_count: usize,
    pub save_failures: usize,
    pub duplicates_dropped: usize,
    pub page_count: usize,
    pub document_kind: DocumentKind,
    /// How text was acquired; `None` when page images went straight to vision.
    pub acquisition: Option<ExtractionMethod>,
    pub import_batch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Every candidate, valid or not, in extraction order.
    pub transactions: Vec<ValidatedTransaction>,
    pub metadata: PipelineMetadata,
}

struct Extraction {
    candidates: Vec<TransactionCandidate>,
    strategy: ExtractionStrategy,
    chunks_parsed: usize,
    page_count: usize,
    acquisition: Option<ExtractionMethod>,
    date_order: DateOrder,
}

/// Runs a document through acquisition, the extraction tiers, dedup,
/// categorization and validation, and saves what is safe to save.
///
/// Flow per document:
/// probe → (image-heavy with a vision client: render → vision batches)
///       | (acquire → normalize → pattern tier → AI chunks when below threshold)
/// → merge + dedup → density confidence → categorize → validate → save.
pub struct StatementPipeline {
    acquirer: Acquirer,
    store: Arc<dyn StatementStore>,
    assigner: CategoryAssigner,
    completion: Option<Arc<dyn CompletionClient>>,
    vision: Option<Arc<dyn VisionClient>>,
    config: PipelineConfig,
}

impl StatementPipeline {
    /// `config.acquisition` replaces whatever the acquirer was configured with.
    pub fn new(acquirer: Acquirer, store: Arc<dyn StatementStore>, config: PipelineConfig) -> Self {
        let acquirer = acquirer
            .with_config(config.acquisition.acquire_config())
            .with_detector(config.acquisition.detector());
        Self {
            acquirer,
            store,
            assigner: CategoryAssigner::default(),
            completion: None,
            vision: None,
            config,
        }
    }

    pub fn with_assigner(mut self, assigner: CategoryAssigner) -> Self {
        self.assigner = assigner;
        self
    }

    pub fn with_completion(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    pub fn with_vision(mut self, client: Arc<dyn VisionClient>) -> Self {
        self.vision = Some(client);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn process(
        &self,
        doc: &RawDocument,
        user_id: &str,
        account: Option<&str>,
    ) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        let import_batch = Uuid::new_v4().to_string();

        // Checked up front: the fallback tier needs at least one category.
        let categories = self.store.find_user_categories(user_id).await?;
        if categories.is_empty() {
            return Err(CategorizeError::NoCategories(user_id.to_string()).into());
        }

        let probe = self.acquirer.probe(doc).await;
        let document_kind = probe.kind;
        let extraction = match self.vision_tier(doc, document_kind).await {
            Some(extraction) => extraction,
            None => self.text_tiers(doc, probe).await?,
        };

        let merged = dedupe(extraction.candidates, self.config.dedup_prefix_len, extraction.date_order);
        if merged.dropped > 0 {
            info!(document = %doc.name, dropped = merged.dropped, "Merged duplicate candidates");
        }
        let duplicates_dropped = merged.dropped;
        let mut candidates = merged.kept;

        let factor = density_factor(candidates.len(), extraction.page_count);
        if factor < 1.0 {
            debug!(document = %doc.name, count = candidates.len(), pages = extraction.page_count, factor, "Sparse extraction, lowering confidence");
            for candidate in &mut candidates {
                candidate.scale_confidence(factor);
            }
        }

        for candidate in &mut candidates {
            let assignment = self
                .assigner
                .assign(user_id, &candidate.narration, candidate.txn_type, &categories, self.store.as_ref())
                .await?;
            candidate.category = Some(assignment);
        }

        let transactions = validate_all(candidates, self.config.review_threshold);
        let (saved_count, save_failures) = if self.config.save_results {
            self.save(&transactions, user_id, account, &import_batch).await
        } else {
            (0, 0)
        };

        // Invalid records count as low confidence whatever their score.
        let high_confidence_count = transactions
            .iter()
            .filter(|t| t.validation.is_valid && !t.validation.needs_manual_review)
            .count();
        let metadata = PipelineMetadata {
            total_found: transactions.len(),
            high_confidence_count,
            low_confidence_count: transactions.len() - high_confidence_count,
            invalid_count: transactions.iter().filter(|t| !t.validation.is_valid).count(),
            chunks_parsed: extraction.chunks_parsed,
            time_taken_ms: started.elapsed().as_millis() as u64,
            method: extraction.strategy,
            saved_count,
            save_failures,
            duplicates_dropped,
            page_count: extraction.page_count,
            document_kind,
            acquisition: extraction.acquisition,
            import_batch,
        };

        info!(
            document = %doc.name,
            method = %metadata.method,
            total = metadata.total_found,
            review = metadata.low_confidence_count,
            saved = metadata.saved_count,
            elapsed_ms = metadata.time_taken_ms,
            "Statement processed"
        );
        Ok(PipelineOutput { transactions, metadata })
    }

    /// See [`learning::learn_correction`].
    pub async fn learn_correction(
        &self,
        user_id: &str,
        narration: &str,
        category_id: &str,
    ) -> Result<LearningRecord, PipelineError> {
        learning::learn_correction(self.store.as_ref(), user_id, narration, category_id).await
    }

    fn ai_extractor(&self, order: DateOrder) -> AiExtractor {
        AiExtractor::new(self.config.ai.clone())
            .with_date_order(order)
            .with_dedup_prefix_len(self.config.dedup_prefix_len)
    }

    /// Page images straight to the vision model. `None` sends the document
    /// down the text path instead.
    async fn vision_tier(&self, doc: &RawDocument, kind: DocumentKind) -> Option<Extraction> {
        if kind != DocumentKind::ImageHeavy {
            return None;
        }
        let vision = self.vision.clone()?;

        let pages = match self.acquirer.render_pages(doc).await {
            Ok(pages) if !pages.is_empty() => pages,
            Ok(_) => {
                warn!(document = %doc.name, "No page images, falling back to OCR");
                return None;
            }
            Err(e) => {
                warn!(document = %doc.name, error = %e, "Rendering failed, falling back to OCR");
                return None;
            }
        };

        let order = self.config.patterns.date_order;
        let outcome = self.ai_extractor(order).with_vision(vision).extract_pages(&pages).await;
        info!(
            document = %doc.name,
            pages = pages.len(),
            batches = outcome.batches,
            failed = outcome.batches_failed,
            count = outcome.candidates.len(),
            "Vision tier finished"
        );

        Some(Extraction {
            candidates: outcome.candidates,
            strategy: ExtractionStrategy::Vision,
            chunks_parsed: outcome.batches - outcome.batches_failed,
            page_count: pages.len(),
            acquisition: None,
            date_order: order,
        })
    }

    async fn text_tiers(&self, doc: &RawDocument, probe: Probe) -> Result<Extraction, PipelineError> {
        let kind = probe.kind;
        let acquired = self.acquirer.acquire_from(doc, probe).await?;
        let text = match kind {
            DocumentKind::ImageHeavy => clean_payment_text(&acquired.text),
            DocumentKind::StructuredText => acquired.text,
        };

        let normalized = normalize_with_report(&text, self.config.patterns.date_order);
        if normalized.ambiguous_dates > 0 && !normalized.order_inferred {
            warn!(
                document = %doc.name,
                ambiguous = normalized.ambiguous_dates,
                order = ?normalized.date_order,
                "Date order not provable from the document, using configured order"
            );
        }

        let profile = PatternProfile {
            date_order: normalized.date_order,
            ..self.config.patterns.clone()
        };
        let mut candidates = PatternExtractor::new(profile).parse_normalized(&normalized);
        let found = candidates.len();
        info!(document = %doc.name, count = found, "Pattern tier finished");

        let mut strategy = ExtractionStrategy::Regex;
        let mut chunks_parsed = 0;
        if found < self.config.escalation_threshold {
            match self.completion.clone() {
                Some(client) => {
                    let chunks = chunk_text(
                        &normalized.text,
                        self.config.chunking.chunk_size,
                        self.config.chunking.overlap,
                    );
                    info!(
                        document = %doc.name,
                        found,
                        threshold = self.config.escalation_threshold,
                        chunks = chunks.len(),
                        "Escalating to AI tier"
                    );
                    let outcome = self
                        .ai_extractor(normalized.date_order)
                        .with_completion(client)
                        .extract_chunks(&chunks)
                        .await;
                    chunks_parsed = outcome.chunks_parsed;
                    strategy = match (found, outcome.candidates.is_empty()) {
                        (0, _) => ExtractionStrategy::Llm,
                        (_, true) => ExtractionStrategy::Regex,
                        (_, false) => ExtractionStrategy::Hybrid,
                    };
                    candidates.extend(outcome.candidates);
                }
                None => warn!(document = %doc.name, found, "AI tier not configured, keeping pattern results"),
            }
        }

        Ok(Extraction {
            candidates,
            strategy,
            chunks_parsed,
            page_count: acquired.page_count,
            acquisition: Some(acquired.method),
            date_order: normalized.date_order,
        })
    }

    /// Returns `(saved, failed)`. A failed save never aborts the run.
    async fn save(
        &self,
        transactions: &[ValidatedTransaction],
        user_id: &str,
        account: Option<&str>,
        import_batch: &str,
    ) -> (usize, usize) {
        let mut saved = 0;
        let mut failed = 0;
        for tx in transactions.iter().filter(|t| t.is_saveable()) {
            let Some(record) = NewTransaction::from_validated(tx, user_id, account, import_batch) else {
                continue;
            };
            match self.store.create_transaction(&record).await {
                Ok(id) => {
                    saved += 1;
                    debug!(id, title = %record.title, "Saved transaction");
                }
                Err(e) => {
                    failed += 1;
                    warn!(title = %record.title, error = %e, "Failed to save transaction");
                }
            }
        }
        (saved, failed)
    }
}

/// Few candidates for many pages means lines were missed or misread.
/// Never above 1.0.
fn density_factor(count: usize, pages: usize) -> f32 {
    let per_page = count as f32 / pages.max(1) as f32;
    if per_page < 1.0 {
        SPARSE_FACTOR
    } else if per_page < 3.0 {
        THIN_FACTOR
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_only_ever_lowers() {
        assert_eq!(density_factor(0, 0), SPARSE_FACTOR);
        assert_eq!(density_factor(2, 3), SPARSE_FACTOR);
        assert_eq!(density_factor(3, 1), 1.0);
        assert_eq!(density_factor(5, 2), THIN_FACTOR);
        assert_eq!(density_factor(40, 4), 1.0);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let metadata = PipelineMetadata {
            total_found: 1,
            high_confidence_count: 1,
            low_confidence_count: 0,
            invalid_count: 0,
            chunks_parsed: 0,
            time_taken_ms: 3,
            method: ExtractionStrategy::Hybrid,
            saved_count: 1,
            save_failures: 0,
            duplicates_dropped: 0,
            page_count: 1,
            document_kind: DocumentKind::StructuredText,
            acquisition: Some(ExtractionMethod::Structural),
            import_batch: "b".to_string(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["totalFound"], 1);
        assert_eq!(json["method"], "hybrid");
        assert_eq!(json["documentKind"], "structured-text");
        assert_eq!(json["timeTakenMs"], 3);
    }
}
