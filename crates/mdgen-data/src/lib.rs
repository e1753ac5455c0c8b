//! File-system side of mdgen: configuration, schema and record loading,
//! artifact output, and the generate/validate pipelines built on them.

pub mod config;
pub mod loader;
pub mod output;
pub mod pipeline;

pub use config::Config;
pub use loader::DataLoadError;
pub use pipeline::{GenerateSummary, PipelineError};
