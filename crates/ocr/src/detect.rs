use crate::types::DocumentKind;

/// Tokens that mark a payment-app export. Bare "upi" is deliberately absent:
/// bank statements print it on nearly every line.
pub const DEFAULT_MARKERS: &[&str] = &[
    "google pay",
    "gpay",
    "phonepe",
    "paytm",
    "upi transaction",
    "upi id",
];

#[derive(Debug, Clone)]
pub struct SourceDetector {
    markers: Vec<String>,
}

impl Default for SourceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl SourceDetector {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers: markers.into_iter().map(|m| m.to_lowercase()).collect() }
    }

    pub fn classify(&self, text: &str) -> DocumentKind {
        let lower = text.to_lowercase();
        if self.markers.iter().any(|m| lower.contains(m.as_str())) {
            DocumentKind::ImageHeavy
        } else {
            DocumentKind::StructuredText
        }
    }

    /// Classify the outcome of a cheap text-layer read. A failed read is
    /// treated as image-heavy so the document takes the OCR path.
    pub fn classify_attempt<E>(&self, attempt: Result<&str, E>) -> DocumentKind {
        match attempt {
            Ok(text) => self.classify(text),
            Err(_) => DocumentKind::ImageHeavy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_app_markers_are_image_heavy() {
        let d = SourceDetector::default();
        assert_eq!(d.classify("Google Pay transaction history"), DocumentKind::ImageHeavy);
        assert_eq!(d.classify("UPI Transaction ID: 1234"), DocumentKind::ImageHeavy);
        assert_eq!(d.classify("Your UPI ID: ram@okaxis"), DocumentKind::ImageHeavy);
    }

    #[test]
    fn bank_statement_with_upi_lines_is_structured() {
        let d = SourceDetector::default();
        let text = "01-08-2025 UPI/NEFT/Ram Card/54321 UPI54321234567 75.00(Dr) 601.54(Cr)";
        assert_eq!(d.classify(text), DocumentKind::StructuredText);
    }

    #[test]
    fn failed_read_fails_toward_ocr() {
        let d = SourceDetector::default();
        let attempt: Result<&str, String> = Err("corrupt xref".to_string());
        assert_eq!(d.classify_attempt(attempt), DocumentKind::ImageHeavy);
    }

    #[test]
    fn custom_markers_are_case_insensitive() {
        let d = SourceDetector::new(vec!["BHIM".to_string()]);
        assert_eq!(d.classify("bhim payment receipt"), DocumentKind::ImageHeavy);
        assert_eq!(d.classify("google pay"), DocumentKind::StructuredText);
    }
}
