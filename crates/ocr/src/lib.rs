pub mod acquire;
pub mod detect;
pub mod hash;
pub mod preprocess;
pub mod quality;
pub mod recognizer;
pub mod render;
pub mod structural;
pub mod types;

pub use acquire::{AcquireConfig, Acquirer, AcquisitionError, Probe};
pub use detect::{SourceDetector, DEFAULT_MARKERS};
pub use hash::fingerprint;
pub use preprocess::{prepare_for_ocr_from_bytes, PreprocessError, PreprocessOptions};
pub use quality::{Quality, QualityGate};
pub use recognizer::{default_backend, MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use render::{EmbeddedImageRenderer, PageRenderer, RenderError, StaticRenderer};
pub use structural::{PdfTextLayer, StaticTextLayer, TextLayer, TextLayerError};
pub use types::{DocumentKind, ExtractionMethod, ExtractionResult, RawDocument, StructuralText};
