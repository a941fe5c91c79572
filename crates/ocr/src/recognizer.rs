use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available: build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG page bytes and return the recognized text.
/// Calls are blocking; the acquisition layer runs them on the blocking pool.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<F> OcrBackend for F
where
    F: Fn(&[u8]) -> Result<String, OcrError> + Send + Sync,
{
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        self(image_bytes)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string for every page.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Stand-in used when no engine is compiled in. Every page fails, so
/// documents without a text layer surface as acquisition failures.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

/// Tesseract when compiled in, otherwise [`UnavailableRecognizer`].
pub fn default_backend(lang: &str) -> Box<dyn OcrBackend> {
    #[cfg(feature = "tesseract")]
    {
        Box::new(tesseract_backend::TesseractRecognizer::new(None, lang))
    }
    #[cfg(not(feature = "tesseract"))]
    {
        let _ = lang;
        Box::new(UnavailableRecognizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("01-08-2025 UPI/NEFT 75.00(Dr) 601.54(Cr)");
        assert_eq!(
            r.recognize(b"fake image data").unwrap(),
            "01-08-2025 UPI/NEFT 75.00(Dr) 601.54(Cr)"
        );
    }

    #[test]
    fn closures_are_backends() {
        let r = |bytes: &[u8]| -> Result<String, OcrError> {
            if bytes.is_empty() {
                Err(OcrError::ImageDecode("empty".to_string()))
            } else {
                Ok(format!("{} bytes", bytes.len()))
            }
        };
        assert_eq!(r.recognize(b"abc").unwrap(), "3 bytes");
        assert!(r.recognize(b"").is_err());
    }

    #[test]
    fn unavailable_always_fails() {
        assert!(matches!(
            UnavailableRecognizer.recognize(b"x"),
            Err(OcrError::NotAvailable)
        ));
    }
}
