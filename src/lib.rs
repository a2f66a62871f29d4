// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod classify;
pub mod config;
pub mod crossval;
pub mod dedup;
pub mod error;
pub mod geo;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod retry;
pub mod sources;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::classify::{Classification, Classifier};
pub use crate::config::{Credentials, KeywordConfig, PipelineConfig};
pub use crate::error::{ConfigError, OutputError, PipelineError, SourceError};
pub use crate::model::{CanonicalRecord, ClassifiedArticle, Confidence, Direction, Query, RawArticle, TrendSignal};
pub use crate::pipeline::{Pipeline, PublishReport, RunReport};
pub use crate::sources::{SourceAdapter, SourceWarning};
