use std::sync::Arc;
use std::time::Duration;

use passbook_core::PageImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::detect::SourceDetector;
use crate::hash;
use crate::preprocess::{self, PreprocessOptions};
use crate::quality::{Quality, QualityGate};
use crate::recognizer::OcrBackend;
use crate::render::{EmbeddedImageRenderer, PageRenderer, RenderError};
use crate::structural::{PdfTextLayer, TextLayer};
use crate::types::{DocumentKind, ExtractionMethod, ExtractionResult, RawDocument, StructuralText};

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Document could not be rendered: {0}")]
    Render(#[from] RenderError),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("No readable text (text layer: {text_layer}; OCR recovered 0 of {pages} pages)")]
    Unreadable { text_layer: String, pages: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub gate: QualityGate,
    pub page_timeout_secs: u64,
    pub preprocess: PreprocessOptions,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            gate: QualityGate::default(),
            page_timeout_secs: 60,
            preprocess: PreprocessOptions::default(),
        }
    }
}

/// Outcome of the cheap first look at a document.
#[derive(Debug, Clone)]
pub struct Probe {
    pub kind: DocumentKind,
    pub text_layer: Result<StructuralText, String>,
}

enum State {
    Evaluate(StructuralText),
    Ocr { fallback: Option<StructuralText>, reason: String },
    Done(ExtractionResult),
}

/// Gets text out of a document: text layer first, OCR when the detector or
/// the quality gate says so.
pub struct Acquirer {
    text_layer: Arc<dyn TextLayer>,
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrBackend>,
    detector: SourceDetector,
    config: AcquireConfig,
}

impl Acquirer {
    pub fn new(
        text_layer: Arc<dyn TextLayer>,
        renderer: Arc<dyn PageRenderer>,
        ocr: Arc<dyn OcrBackend>,
    ) -> Self {
        Self {
            text_layer,
            renderer,
            ocr,
            detector: SourceDetector::default(),
            config: AcquireConfig::default(),
        }
    }

    /// PDF text layer and embedded-image renderer around the given OCR engine.
    pub fn pdf(ocr: Arc<dyn OcrBackend>) -> Self {
        Self::new(Arc::new(PdfTextLayer), Arc::new(EmbeddedImageRenderer), ocr)
    }

    pub fn with_detector(mut self, detector: SourceDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_config(mut self, config: AcquireConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the text layer once and classify the document from it.
    pub async fn probe(&self, doc: &RawDocument) -> Probe {
        let layer = Arc::clone(&self.text_layer);
        let bytes = doc.bytes.clone();
        let text_layer = match tokio::task::spawn_blocking(move || layer.extract(&bytes)).await {
            Ok(r) => r.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let kind = self
            .detector
            .classify_attempt(text_layer.as_ref().map(|t| t.text.as_str()));
        info!(document = %doc.name, %kind, text_layer_ok = text_layer.is_ok(), "Probed document");
        Probe { kind, text_layer }
    }

    pub async fn acquire(&self, doc: &RawDocument) -> Result<ExtractionResult, AcquisitionError> {
        let probe = self.probe(doc).await;
        self.acquire_from(doc, probe).await
    }

    /// Continue acquisition from an earlier [`Probe`].
    pub async fn acquire_from(
        &self,
        doc: &RawDocument,
        probe: Probe,
    ) -> Result<ExtractionResult, AcquisitionError> {
        let mut state = match (probe.kind, probe.text_layer) {
            (DocumentKind::StructuredText, Ok(text)) => State::Evaluate(text),
            (DocumentKind::ImageHeavy, Ok(text)) => State::Ocr {
                fallback: Some(text),
                reason: "payment-app document".to_string(),
            },
            (_, Err(e)) => State::Ocr { fallback: None, reason: e },
        };

        loop {
            state = match state {
                State::Evaluate(text) => match self.config.gate.assess(&text.text) {
                    Quality::Accept => State::Done(ExtractionResult {
                        text: text.text,
                        method: ExtractionMethod::Structural,
                        page_count: text.page_count,
                    }),
                    low => State::Ocr { fallback: Some(text), reason: format!("{low:?}") },
                },
                State::Ocr { fallback, reason } => {
                    info!(document = %doc.name, %reason, "Falling back to OCR");
                    let pages = self.ocr_pages(doc).await?;
                    let readable = pages.iter().filter(|t| !t.trim().is_empty()).count();
                    if readable > 0 {
                        State::Done(ExtractionResult {
                            text: pages.join("\n"),
                            method: ExtractionMethod::Ocr,
                            page_count: pages.len(),
                        })
                    } else {
                        match fallback {
                            Some(text) if !text.text.trim().is_empty() => {
                                warn!(document = %doc.name, "OCR recovered nothing, keeping text layer");
                                State::Done(ExtractionResult {
                                    text: text.text,
                                    method: ExtractionMethod::Structural,
                                    page_count: text.page_count,
                                })
                            }
                            _ => {
                                return Err(AcquisitionError::Unreadable {
                                    text_layer: reason,
                                    pages: pages.len(),
                                })
                            }
                        }
                    }
                }
                State::Done(result) => {
                    info!(
                        document = %doc.name,
                        fingerprint = %hash::fingerprint(&doc.bytes),
                        method = %result.method,
                        pages = result.page_count,
                        chars = result.text.len(),
                        "Acquired text"
                    );
                    return Ok(result);
                }
            };
        }
    }

    /// Render every page. Pages that fail to render are logged and skipped.
    pub async fn render_pages(&self, doc: &RawDocument) -> Result<Vec<PageImage>, AcquisitionError> {
        Ok(self
            .render_slots(doc)
            .await?
            .into_iter()
            .filter_map(|slot| match slot {
                Ok(page) => Some(page),
                Err(e) => {
                    warn!(document = %doc.name, error = %e, "Skipping page");
                    None
                }
            })
            .collect())
    }

    async fn render_slots(
        &self,
        doc: &RawDocument,
    ) -> Result<Vec<Result<PageImage, RenderError>>, AcquisitionError> {
        let renderer = Arc::clone(&self.renderer);
        let bytes = doc.bytes.clone();
        tokio::task::spawn_blocking(move || renderer.render_pages(&bytes))
            .await
            .map_err(|e| AcquisitionError::Task(e.to_string()))?
            .map_err(AcquisitionError::from)
    }

    /// OCR all pages concurrently. A page that fails or times out yields an
    /// empty string in its slot; output is in page order.
    async fn ocr_pages(&self, doc: &RawDocument) -> Result<Vec<String>, AcquisitionError> {
        let slots = self.render_slots(doc).await?;
        let mut texts = vec![String::new(); slots.len()];
        let timeout = Duration::from_secs(self.config.page_timeout_secs);
        let options = self.config.preprocess;

        let mut set = JoinSet::new();
        for (index, slot) in slots.into_iter().enumerate() {
            let page = match slot {
                Ok(page) => page,
                Err(e) => {
                    warn!(document = %doc.name, page = index, error = %e, "Page not rendered");
                    continue;
                }
            };
            let ocr = Arc::clone(&self.ocr);
            set.spawn(async move {
                let job = tokio::task::spawn_blocking(move || {
                    let prepared = match preprocess::prepare_for_ocr_from_bytes(&page.bytes, &options) {
                        Ok(png) => png,
                        Err(e) => {
                            debug!(page = index, error = %e, "Preprocessing skipped");
                            page.bytes
                        }
                    };
                    ocr.recognize(&prepared)
                });
                let outcome = match tokio::time::timeout(timeout, job).await {
                    Ok(Ok(Ok(text))) => Ok(text),
                    Ok(Ok(Err(e))) => Err(e.to_string()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {}s", timeout.as_secs_f32())),
                };
                (index, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(text))) => texts[index] = text,
                Ok((index, Err(e))) => warn!(document = %doc.name, page = index, error = %e, "OCR failed for page"),
                Err(e) => warn!(document = %doc.name, error = %e, "OCR task panicked"),
            }
        }

        Ok(texts)
    }
}
