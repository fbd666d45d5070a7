//! Conversation session state.
//!
//! A [`SessionState`] owns at most one initialised [`Pipeline`] plus the
//! transcript of the conversation about it. Loading a new document or
//! resetting discards both the previous document state and the transcript.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::llm::LanguageModel;
use crate::models::{Answer, Role, Transcript};
use crate::pipeline::Pipeline;
use crate::progress::IngestProgressReporter;

#[derive(Default)]
pub struct SessionState {
    pipeline: Option<Pipeline>,
    transcript: Transcript,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` into this session, replacing any previous document.
    ///
    /// On failure the session is left uninitialised.
    pub async fn initialize(
        &mut self,
        config: &Config,
        path: &Path,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        progress: &dyn IngestProgressReporter,
    ) -> Result<&Pipeline> {
        self.reset();
        let pipeline = Pipeline::initialize(config, path, model, embedder, progress).await?;
        Ok(self.pipeline.insert(pipeline))
    }

    /// Answer `question`, recording both turns.
    ///
    /// The user turn is recorded even when answering fails; the assistant
    /// turn only on success.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let pipeline = self.pipeline.as_ref().ok_or(PipelineError::NotInitialized)?;
        self.transcript.push(Role::User, question);
        let answer = pipeline.answer(question).await?;
        self.transcript.push(Role::Assistant, answer.text.clone());
        Ok(answer)
    }

    /// Drop the document, index and transcript.
    pub fn reset(&mut self) {
        self.pipeline = None;
        self.transcript.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}
