//! AI-assisted statement extraction: text chunks or page images go to a
//! generative model, and the JSON it returns is repaired into candidates.

pub mod client;
pub mod config;
pub mod extractor;
pub mod postprocess;
pub mod prompt;
pub mod response;

pub use client::{AiError, CompletionClient, GeminiClient, ScriptedCompletion, VisionClient};
pub use config::AiConfig;
pub use extractor::{AiExtractor, ChunkOutcome, VisionOutcome};
pub use postprocess::{post_process, repair_amount, DEFAULT_CONFIDENCE};
pub use response::{parse_transactions, RawTransaction};
