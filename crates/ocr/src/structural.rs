use lopdf::Document;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::StructuralText;

#[derive(Debug, Error)]
pub enum TextLayerError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
    #[error("Text extraction failed: {0}")]
    Extract(String),
}

/// Reads the embedded text layer of a document.
pub trait TextLayer: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<StructuralText, TextLayerError>;
}

/// `pdf-extract` for the text, `lopdf` for the page count.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextLayer;

impl TextLayer for PdfTextLayer {
    fn extract(&self, bytes: &[u8]) -> Result<StructuralText, TextLayerError> {
        let doc = Document::load_mem(bytes).map_err(|e| TextLayerError::Parse(e.to_string()))?;
        let page_count = doc.get_pages().len();

        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            warn!(error = %e, "pdf-extract failed");
            TextLayerError::Extract(e.to_string())
        })?;

        debug!(pages = page_count, chars = text.len(), "Read text layer");
        Ok(StructuralText { text, page_count })
    }
}

/// Fixed text layer for tests.
#[derive(Debug, Clone)]
pub struct StaticTextLayer {
    result: Result<StructuralText, String>,
}

impl StaticTextLayer {
    pub fn text(text: impl Into<String>, page_count: usize) -> Self {
        Self { result: Ok(StructuralText { text: text.into(), page_count }) }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self { result: Err(reason.into()) }
    }
}

impl TextLayer for StaticTextLayer {
    fn extract(&self, _bytes: &[u8]) -> Result<StructuralText, TextLayerError> {
        self.result.clone().map_err(TextLayerError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let r = PdfTextLayer.extract(b"this is not a pdf");
        assert!(matches!(r, Err(TextLayerError::Parse(_))));
    }

    #[test]
    fn static_layer_returns_configured_text() {
        let layer = StaticTextLayer::text("hello", 2);
        let t = layer.extract(b"").unwrap();
        assert_eq!(t.text, "hello");
        assert_eq!(t.page_count, 2);
        assert!(StaticTextLayer::failing("x").extract(b"").is_err());
    }
}
