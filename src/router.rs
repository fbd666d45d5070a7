//! Question routing.
//!
//! The [`Router`] classifies a question once, looks the resulting label up
//! in its strategy table, and runs exactly that strategy with the original
//! question. Nothing runs speculatively and nothing is retried here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::Classifier;
use crate::error::{PipelineError, Result};
use crate::models::{Answer, RouteLabel};
use crate::strategy::AnswerStrategy;

pub struct Router {
    classifier: Classifier,
    strategies: HashMap<RouteLabel, Arc<dyn AnswerStrategy>>,
}

impl Router {
    /// Register `strategies` under their own [`AnswerStrategy::route`].
    ///
    /// # Errors
    ///
    /// [`PipelineError::Routing`] if a label has no strategy or two strategies
    /// claim the same label.
    pub fn new(classifier: Classifier, strategies: Vec<Arc<dyn AnswerStrategy>>) -> Result<Self> {
        let mut table: HashMap<RouteLabel, Arc<dyn AnswerStrategy>> = HashMap::new();
        for strategy in strategies {
            let route = strategy.route();
            if table.insert(route, strategy).is_some() {
                return Err(PipelineError::Routing(format!(
                    "duplicate strategy for route {}",
                    route
                )));
            }
        }
        if let Some(missing) = RouteLabel::ALL.iter().find(|l| !table.contains_key(l)) {
            return Err(PipelineError::Routing(format!(
                "no strategy registered for route {}",
                missing
            )));
        }
        Ok(Self {
            classifier,
            strategies: table,
        })
    }

    /// Run the strategy registered for `route`, skipping classification.
    pub async fn dispatch(&self, route: RouteLabel, question: &str) -> Result<String> {
        let strategy = self
            .strategies
            .get(&route)
            .ok_or_else(|| PipelineError::Routing(format!("no strategy for route {}", route)))?;
        strategy.answer(question).await
    }

    /// Classify `question` and answer it with the matching strategy.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let route = self.route(question).await?;
        tracing::info!(%route, "routing question");
        let text = self.dispatch(route, question).await?;
        Ok(Answer { route, text })
    }

    /// Classification only; no strategy runs.
    pub async fn route(&self, question: &str) -> Result<RouteLabel> {
        Ok(self.classifier.classify(question).await?.route())
    }
}
