//! Error taxonomy for the question-answering pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::RouteLabel;

/// Failures surfaced by ingestion, indexing, routing and answering.
///
/// Ingest and index failures are fatal to initialization. Classification and
/// strategy failures are per-question; the session stays usable.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document could not be read, parsed, or contained no text.
    #[error("Ingest error ({}): {message}", path.display())]
    Ingest { path: PathBuf, message: String },

    /// Index construction failed or retrieval ran without a built index.
    #[error("Index error: {0}")]
    Index(String),

    /// The strategy table does not cover every route exactly once.
    #[error("Routing error: {0}")]
    Routing(String),

    /// The language-model call made by the classifier failed.
    #[error("Classification error: {0}")]
    Classification(String),

    /// The generation call inside an answering strategy failed.
    #[error("Strategy error ({route}): {message}")]
    Strategy { route: RouteLabel, message: String },

    /// A question arrived before a document was loaded, or after a reset.
    #[error("Session is not initialized: load a document first")]
    NotInitialized,
}

impl PipelineError {
    pub fn ingest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PipelineError::Ingest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Ingest { .. } => "ingest_failed",
            PipelineError::Index(_) => "index_error",
            PipelineError::Routing(_) => "routing_error",
            PipelineError::Classification(_) => "classification_failed",
            PipelineError::Strategy { .. } => "strategy_failed",
            PipelineError::NotInitialized => "not_initialized",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
