use serde::{Deserialize, Serialize};

/// Decides whether a structural text layer is good enough to skip OCR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGate {
    pub min_text_chars: usize,
    pub max_control_ratio: f32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self { min_text_chars: 500, max_control_ratio: 0.10 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Quality {
    Accept,
    TooShort { chars: usize },
    Garbled { ratio: f32 },
}

impl Quality {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Quality::Accept)
    }
}

impl QualityGate {
    pub fn assess(&self, text: &str) -> Quality {
        let chars = text.trim().chars().count();
        if chars < self.min_text_chars {
            return Quality::TooShort { chars };
        }
        let total = text.chars().count();
        let bad = text.chars().filter(|c| is_garbage(*c)).count();
        let ratio = bad as f32 / total as f32;
        if ratio > self.max_control_ratio {
            return Quality::Garbled { ratio };
        }
        Quality::Accept
    }
}

fn is_garbage(c: char) -> bool {
    c == '\u{FFFD}' || (c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}
