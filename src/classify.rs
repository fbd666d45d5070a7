//! Question classification.
//!
//! The classifier asks the language model for a single routing token and
//! parses the reply at the boundary into a [`Classification`]. Replies that
//! are not exactly `CHAT`, `LOCAL` or `GLOBAL` (after trimming) become
//! [`Classification::Unknown`], which routes to LOCAL.

use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::llm::LanguageModel;
use crate::models::RouteLabel;
use crate::prompts::Prompts;

/// Parsed classifier reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Chat,
    Local,
    Global,
    /// The raw model output that matched no label.
    Unknown(String),
}

impl Classification {
    /// Trim and match case-sensitively against the route tokens.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "CHAT" => Classification::Chat,
            "LOCAL" => Classification::Local,
            "GLOBAL" => Classification::Global,
            _ => Classification::Unknown(raw.to_string()),
        }
    }

    /// The strategy that handles this classification. Unknown falls back to LOCAL.
    pub fn route(&self) -> RouteLabel {
        match self {
            Classification::Chat => RouteLabel::Chat,
            Classification::Local | Classification::Unknown(_) => RouteLabel::Local,
            Classification::Global => RouteLabel::Global,
        }
    }
}

/// Labels questions with one model call each.
pub struct Classifier {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
}

impl Classifier {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<Prompts>) -> Self {
        Self { model, prompts }
    }

    /// # Errors
    ///
    /// [`PipelineError::Classification`] when the model call fails.
    pub async fn classify(&self, question: &str) -> Result<Classification> {
        let prompt = self.prompts.render_classify(question);
        let raw = self
            .model
            .generate(&prompt)
            .await
            .map_err(|e| PipelineError::Classification(format!("{:#}", e)))?;

        let classification = Classification::parse(&raw);
        if let Classification::Unknown(ref output) = classification {
            tracing::warn!(
                output = %output.trim(),
                "classifier returned no known label; routing to LOCAL"
            );
        } else {
            tracing::debug!(route = %classification.route(), "question classified");
        }
        Ok(classification)
    }
}
