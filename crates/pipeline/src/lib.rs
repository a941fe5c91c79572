pub mod config;
pub mod error;
pub mod learning;
pub mod orchestrator;

pub use config::{AcquisitionConfig, CategoriesConfig, ChunkingConfig, ConfigError, PipelineConfig};
pub use error::PipelineError;
pub use learning::learn_correction;
pub use orchestrator::{ExtractionStrategy, PipelineMetadata, PipelineOutput, StatementPipeline};
