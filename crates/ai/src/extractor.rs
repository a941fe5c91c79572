use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use passbook_core::{DateOrder, Origin, PageImage, TransactionCandidate};
use passbook_import::{dedupe, TextChunk};
use tracing::{info, warn};

use crate::client::{AiError, CompletionClient, VisionClient};
use crate::config::AiConfig;
use crate::postprocess::post_process;
use crate::prompt::{chunk_prompt, vision_prompt};
use crate::response::parse_transactions;

/// What the text-chunk mode produced.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    pub candidates: Vec<TransactionCandidate>,
    /// Chunks whose response decoded, including empty arrays.
    pub chunks_parsed: usize,
    pub chunks_failed: usize,
}

#[derive(Debug, Default)]
pub struct VisionOutcome {
    pub candidates: Vec<TransactionCandidate>,
    pub batches: usize,
    pub batches_failed: usize,
}

/// AI-assisted extraction over text chunks or page images.
///
/// Every unit of work (chunk or batch) fails on its own: errors, timeouts and
/// undecodable responses are logged and contribute nothing.
pub struct AiExtractor {
    completion: Option<Arc<dyn CompletionClient>>,
    vision: Option<Arc<dyn VisionClient>>,
    config: AiConfig,
    date_order: DateOrder,
    dedup_prefix_len: usize,
}

impl AiExtractor {
    pub fn new(config: AiConfig) -> Self {
        Self {
            completion: None,
            vision: None,
            config,
            date_order: DateOrder::DayFirst,
            dedup_prefix_len: 20,
        }
    }

    pub fn with_completion(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    pub fn with_vision(mut self, client: Arc<dyn VisionClient>) -> Self {
        self.vision = Some(client);
        self
    }

    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    pub fn with_dedup_prefix_len(mut self, len: usize) -> Self {
        self.dedup_prefix_len = len;
        self
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    pub fn has_vision(&self) -> bool {
        self.vision.is_some()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Send chunks concurrently (at most `chunk_concurrency` in flight).
    /// Results are merged in chunk order.
    pub async fn extract_chunks(&self, chunks: &[TextChunk]) -> ChunkOutcome {
        let Some(client) = self.completion.clone() else {
            return ChunkOutcome::default();
        };
        let limit = self.request_timeout();

        let mut responses: Vec<(usize, Result<String, AiError>)> = stream::iter(chunks.iter().map(|chunk| {
            let client = Arc::clone(&client);
            let prompt = chunk_prompt(chunk);
            let index = chunk.chunk_index;
            async move {
                let result = match tokio::time::timeout(limit, client.complete(&prompt)).await {
                    Ok(r) => r,
                    Err(_) => Err(AiError::Timeout(limit)),
                };
                (index, result)
            }
        }))
        .buffer_unordered(self.config.chunk_concurrency.max(1))
        .collect()
        .await;
        responses.sort_by_key(|(index, _)| *index);

        let mut outcome = ChunkOutcome::default();
        let mut all = Vec::new();
        for (chunk_index, response) in responses {
            match response.and_then(|text| parse_transactions(&text)) {
                Ok(records) => {
                    let found = records.len();
                    all.extend(post_process(
                        records,
                        &Origin::AiText { chunk_index },
                        self.date_order,
                        self.dedup_prefix_len,
                    ));
                    outcome.chunks_parsed += 1;
                    info!(chunk = chunk_index, count = found, "Chunk extracted");
                }
                Err(e) => {
                    outcome.chunks_failed += 1;
                    warn!(chunk = chunk_index, error = %e, "Chunk extraction failed");
                }
            }
        }

        // Overlapping windows report the same line twice.
        outcome.candidates = dedupe(all, self.dedup_prefix_len, self.date_order).kept;
        outcome
    }

    /// Send pages in batches of `vision_batch_size`, one request per batch,
    /// sequentially, pausing `vision_batch_delay_ms` between batches.
    pub async fn extract_pages(&self, pages: &[PageImage]) -> VisionOutcome {
        let Some(client) = self.vision.clone() else {
            return VisionOutcome::default();
        };
        let limit = self.request_timeout();
        let delay = Duration::from_millis(self.config.vision_batch_delay_ms);

        let mut outcome = VisionOutcome::default();
        let mut all = Vec::new();
        for (batch_index, batch) in pages.chunks(self.config.vision_batch_size.max(1)).enumerate() {
            if batch_index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcome.batches += 1;
            let prompt = vision_prompt(batch.len());
            let response = match tokio::time::timeout(limit, client.complete_with_images(&prompt, batch)).await {
                Ok(r) => r,
                Err(_) => Err(AiError::Timeout(limit)),
            };
            match response.and_then(|text| parse_transactions(&text)) {
                Ok(records) => {
                    info!(batch = batch_index, pages = batch.len(), count = records.len(), "Vision batch extracted");
                    all.extend(post_process(
                        records,
                        &Origin::AiVision { batch_index },
                        self.date_order,
                        self.dedup_prefix_len,
                    ));
                }
                Err(e) => {
                    outcome.batches_failed += 1;
                    warn!(batch = batch_index, error = %e, "Vision batch failed");
                }
            }
        }

        outcome.candidates = dedupe(all, self.dedup_prefix_len, self.date_order).kept;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedCompletion;
    use passbook_core::{Money, TxnType};
    use passbook_import::chunk_text;
    use std::time::Instant;

    fn config() -> AiConfig {
        AiConfig {
            request_timeout_secs: 1,
            vision_batch_delay_ms: 50,
            ..AiConfig::default()
        }
    }

    fn chunks(n: usize) -> Vec<TextChunk> {
        let text = (0..n)
            .map(|i| format!("{:02} {}", i, "x".repeat(95)))
            .collect::<Vec<_>>()
            .join("\n");
        let out = chunk_text(&text, 100, 0);
        assert_eq!(out.len(), n);
        out
    }

    fn line(date: &str, narration: &str, amount: f64) -> String {
        format!(r#"{{"date":"{date}","narration":"{narration}","amount":{amount},"debit_credit":"Dr","confidence":0.9}}"#)
    }

    #[tokio::test]
    async fn no_client_means_no_work() {
        let outcome = AiExtractor::new(config()).extract_chunks(&chunks(2)).await;
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.chunks_parsed, 0);
    }

    #[tokio::test]
    async fn failed_chunk_does_not_abort_others() {
        let scripted = ScriptedCompletion::new()
            .respond(format!("[{}]", line("2025-08-01", "UPI/Zomato", 250.0)))
            .fail(AiError::Status { status: 503, body: "overloaded".to_string() })
            .respond("not json at all");
        let extractor = AiExtractor::new(AiConfig { chunk_concurrency: 1, ..config() })
            .with_completion(Arc::new(scripted));

        let outcome = extractor.extract_chunks(&chunks(3)).await;
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.chunks_parsed, 1);
        assert_eq!(outcome.chunks_failed, 2);
        assert_eq!(outcome.candidates[0].amount, Money::parse("250"));
        assert_eq!(outcome.candidates[0].txn_type, Some(TxnType::Debit));
    }

    #[tokio::test]
    async fn slow_chunk_times_out() {
        let scripted = ScriptedCompletion::new()
            .respond("[]")
            .with_delay(Duration::from_millis(1500));
        let extractor = AiExtractor::new(config()).with_completion(Arc::new(scripted));
        let outcome = extractor.extract_chunks(&chunks(1)).await;
        assert_eq!(outcome.chunks_failed, 1);
        assert!(outcome.candidates.is_empty());
    }

    #[tokio::test]
    async fn overlapping_chunks_are_deduplicated_in_chunk_order() {
        let same = line("2025-08-01", "UPI/Zomato/Order", 250.0);
        let scripted = ScriptedCompletion::new()
            .respond(format!("[{same}]"))
            .respond(format!("[{same},{}]", line("2025-08-02", "NEFT/Rent", 15000.0)));
        let extractor = AiExtractor::new(AiConfig { chunk_concurrency: 1, ..config() })
            .with_completion(Arc::new(scripted));
        let outcome = extractor.extract_chunks(&chunks(2)).await;
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].origin, Origin::AiText { chunk_index: 0 });
        assert_eq!(outcome.candidates[1].narration, "NEFT/Rent");
    }

    #[tokio::test]
    async fn vision_batches_pages_and_waits_between_batches() {
        let scripted = Arc::new(
            ScriptedCompletion::new()
                .respond(format!("[{}]", line("2025-11-30", "Harsh Upadhyay", 110.0)))
                .respond("[]")
                .respond(format!("[{}]", line("2025-12-01", "IRCTC", 945.5))),
        );
        let extractor = AiExtractor::new(AiConfig { vision_batch_size: 2, ..config() })
            .with_vision(scripted.clone());
        let pages: Vec<PageImage> = (0..5).map(|i| PageImage::png(i, vec![i as u8])).collect();

        let started = Instant::now();
        let outcome = extractor.extract_pages(&pages).await;
        assert!(started.elapsed() >= Duration::from_millis(100), "two pauses expected");

        assert_eq!(scripted.image_counts(), [2, 2, 1]);
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].origin, Origin::AiVision { batch_index: 0 });
        assert_eq!(outcome.candidates[1].origin, Origin::AiVision { batch_index: 2 });
    }

    #[tokio::test]
    async fn failed_vision_batch_is_skipped() {
        let scripted = ScriptedCompletion::new()
            .fail(AiError::EmptyResponse)
            .respond(format!("[{}]", line("2025-12-01", "IRCTC", 945.5)));
        let extractor = AiExtractor::new(AiConfig { vision_batch_size: 1, ..config() })
            .with_vision(Arc::new(scripted));
        let pages = vec![PageImage::png(0, vec![0]), PageImage::png(1, vec![1])];
        let outcome = extractor.extract_pages(&pages).await;
        assert_eq!(outcome.batches_failed, 1);
        assert_eq!(outcome.candidates.len(), 1);
    }
}
