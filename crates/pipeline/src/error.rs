use passbook_core::StoreError;
use passbook_import::CategorizeError;
use passbook_ocr::AcquisitionError;
use thiserror::Error;

/// Conditions that end a pipeline run without a result.
///
/// Per-page, per-chunk and per-batch failures never surface here; they are
/// logged and reflected in the output counts instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Document could not be read: {0}")]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Categorize(#[from] CategorizeError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Narration is empty after normalization")]
    EmptyPattern,
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),
}
