pub mod client;
pub mod compress;
pub mod config;
pub mod diff;
pub mod explain;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod segment;
pub mod tasks;
pub mod validate;

pub use client::{GenerateError, OllamaClient, TextGenerator};
pub use config::PipelineConfig;
pub use model::{AnalysisOutcome, AnalysisReport, ChangeRecord, ErrorReport, ErrorType};
pub use pipeline::{extract_change_records, run_analysis};
