//! Answering strategies, one per [`RouteLabel`].
//!
//! | Route | Model input |
//! |-------|-------------|
//! | CHAT | the raw question |
//! | LOCAL | local-QA prompt with retrieved segments as context |
//! | GLOBAL | global-QA prompt with the full document text |
//!
//! Strategy output is the model's text, unmodified.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::index::SegmentIndex;
use crate::llm::LanguageModel;
use crate::models::RouteLabel;
use crate::prompts::Prompts;

/// Separator between retrieved segments in the LOCAL context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[async_trait]
pub trait AnswerStrategy: Send + Sync {
    /// The label this strategy is registered under.
    fn route(&self) -> RouteLabel;

    async fn answer(&self, question: &str) -> Result<String>;
}

async fn generate(model: &dyn LanguageModel, route: RouteLabel, prompt: &str) -> Result<String> {
    model
        .generate(prompt)
        .await
        .map_err(|e| PipelineError::Strategy {
            route,
            message: format!("{:#}", e),
        })
}

/// Casual conversation; no document context.
pub struct ChatStrategy {
    model: Arc<dyn LanguageModel>,
}

impl ChatStrategy {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl AnswerStrategy for ChatStrategy {
    fn route(&self) -> RouteLabel {
        RouteLabel::Chat
    }

    async fn answer(&self, question: &str) -> Result<String> {
        generate(self.model.as_ref(), RouteLabel::Chat, question).await
    }
}

/// Retrieval-augmented answer from the most relevant segments.
pub struct LocalStrategy {
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    index: Arc<SegmentIndex>,
    retrieval: RetrievalConfig,
    prompts: Arc<Prompts>,
}

impl LocalStrategy {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<SegmentIndex>,
        retrieval: RetrievalConfig,
        prompts: Arc<Prompts>,
    ) -> Self {
        Self {
            model,
            embedder,
            index,
            retrieval,
            prompts,
        }
    }
}

#[async_trait]
impl AnswerStrategy for LocalStrategy {
    fn route(&self) -> RouteLabel {
        RouteLabel::Local
    }

    async fn answer(&self, question: &str) -> Result<String> {
        let segments = self
            .index
            .search(
                self.embedder.as_ref(),
                question,
                self.retrieval.k,
                self.retrieval.fetch_k,
                self.retrieval.diversity,
            )
            .await?;

        let context = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        tracing::debug!(
            segments = segments.len(),
            context_chars = context.chars().count(),
            "local context assembled"
        );

        let prompt = self.prompts.render_local(&context, question);
        generate(self.model.as_ref(), RouteLabel::Local, &prompt).await
    }
}

/// Whole-document answer; the full text goes into the prompt.
pub struct GlobalStrategy {
    model: Arc<dyn LanguageModel>,
    full_text: Arc<str>,
    prompts: Arc<Prompts>,
}

impl GlobalStrategy {
    pub fn new(model: Arc<dyn LanguageModel>, full_text: Arc<str>, prompts: Arc<Prompts>) -> Self {
        Self {
            model,
            full_text,
            prompts,
        }
    }
}

#[async_trait]
impl AnswerStrategy for GlobalStrategy {
    fn route(&self) -> RouteLabel {
        RouteLabel::Global
    }

    async fn answer(&self, question: &str) -> Result<String> {
        let prompt = self.prompts.render_global(&self.full_text, question);
        generate(self.model.as_ref(), RouteLabel::Global, &prompt).await
    }
}
