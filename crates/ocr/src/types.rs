use serde::{Deserialize, Serialize};
use std::fmt;

/// An uploaded statement. Lives for one pipeline run and is never persisted.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// Shape of a document as judged by the source detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// Bank-statement style with a usable text layer.
    StructuredText,
    /// Payment-app exports and scans where OCR or vision is required.
    ImageHeavy,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::StructuredText => write!(f, "structured-text"),
            DocumentKind::ImageHeavy => write!(f, "image-heavy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Structural,
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Structural => write!(f, "structural"),
            ExtractionMethod::Ocr => write!(f, "ocr"),
        }
    }
}

/// Text recovered from one document, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
}

/// Embedded text layer as read by a [`crate::TextLayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralText {
    pub text: String,
    pub page_count: usize,
}
