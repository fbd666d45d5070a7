//! Document pipeline: ingest → index → router.
//!
//! A [`Pipeline`] is the fully initialised state for one document: the
//! extracted pages, the immutable segment index, and a router wired with the
//! three strategies. It is built once and then only read.

use std::path::Path;
use std::sync::Arc;

use crate::classify::Classifier;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::index::SegmentIndex;
use crate::ingest::ingest;
use crate::llm::LanguageModel;
use crate::models::{Answer, Document};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::prompts::Prompts;
use crate::router::Router;
use crate::strategy::{AnswerStrategy, ChatStrategy, GlobalStrategy, LocalStrategy};

pub struct Pipeline {
    document: Document,
    index: Arc<SegmentIndex>,
    router: Router,
}

impl Pipeline {
    /// Load `path`, embed its segments and assemble the router.
    ///
    /// Extraction runs on the blocking thread pool; the call returns once the
    /// index is complete.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Ingest`], [`PipelineError::Index`] or
    /// [`PipelineError::Routing`]; nothing is built when one occurs.
    pub async fn initialize(
        config: &Config,
        path: &Path,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        progress: &dyn IngestProgressReporter,
    ) -> Result<Self> {
        progress.report(IngestProgressEvent::Extracting {
            path: path.display().to_string(),
        });

        let owned_path = path.to_path_buf();
        let chunking = config.chunking.clone();
        let ingested = tokio::task::spawn_blocking(move || ingest(&owned_path, &chunking))
            .await
            .map_err(|e| PipelineError::ingest(path, format!("extraction task failed: {}", e)))??;

        progress.report(IngestProgressEvent::Splitting {
            pages: ingested.document.pages.len() as u64,
        });

        let full_text: Arc<str> = Arc::from(ingested.full_text());
        let document = ingested.document;

        let index = SegmentIndex::build(
            &embedder,
            ingested.segments,
            config.embedding.batch_size,
            |n, total| {
                progress.report(IngestProgressEvent::Embedding {
                    n: n as u64,
                    total: total as u64,
                })
            },
        )
        .await?;
        let index = Arc::new(index);

        progress.report(IngestProgressEvent::Ready {
            segments: index.len() as u64,
        });

        let prompts = Arc::new(Prompts::from_config(&config.prompts));
        let strategies: Vec<Arc<dyn AnswerStrategy>> = vec![
            Arc::new(ChatStrategy::new(model.clone())),
            Arc::new(LocalStrategy::new(
                model.clone(),
                embedder,
                index.clone(),
                config.retrieval.clone(),
                prompts.clone(),
            )),
            Arc::new(GlobalStrategy::new(model.clone(), full_text, prompts.clone())),
        ];
        let router = Router::new(Classifier::new(model, prompts), strategies)?;

        Ok(Self {
            document,
            index,
            router,
        })
    }

    /// Route and answer one question.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        self.router.answer(question).await
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }
}
