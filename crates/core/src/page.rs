use serde::{Deserialize, Serialize};

/// A rendered page, ready for OCR or a vision model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// Zero-based position in the source document.
    pub page_index: usize,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn png(page_index: usize, bytes: Vec<u8>) -> Self {
        Self { page_index, mime_type: "image/png".to_string(), bytes }
    }

    pub fn jpeg(page_index: usize, bytes: Vec<u8>) -> Self {
        Self { page_index, mime_type: "image/jpeg".to_string(), bytes }
    }
}
