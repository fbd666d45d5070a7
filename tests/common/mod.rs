//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use askdoc::embedding::Embedder;
use askdoc::llm::LanguageModel;
use askdoc::progress::{IngestProgressEvent, IngestProgressReporter};

pub const COURSE: &str = "Week 1: intro. Week 2: advanced topics. Total duration: 2 weeks.";

const CLASSIFY_PREFIX: &str = "Classify the user question.";

/// Language model that answers classification prompts from a script and
/// everything else with a numbered canned reply. Every prompt is recorded.
pub struct ScriptedModel {
    /// `(needle, reply)`: the first needle found in the question decides the
    /// classifier reply. Unmatched questions get `LOCAL`.
    routes: Vec<(&'static str, &'static str)>,
    fail_classify: bool,
    fail_answers: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(routes: &[(&'static str, &'static str)]) -> Self {
        Self {
            routes: routes.to_vec(),
            fail_classify: false,
            fail_answers: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Routes used by the course scenarios.
    pub fn course() -> Self {
        Self::new(&[
            ("How are you", "CHAT"),
            ("total duration", "  GLOBAL\n"),
            ("week 2", "LOCAL"),
            ("banana", "Probably LOCAL?"),
        ])
    }

    pub fn failing_classifier() -> Self {
        Self {
            fail_classify: true,
            ..Self::course()
        }
    }

    pub fn failing_answers() -> Self {
        Self {
            fail_answers: true,
            ..Self::course()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn classify_calls(&self) -> usize {
        self.prompts()
            .iter()
            .filter(|p| p.starts_with(CLASSIFY_PREFIX))
            .count()
    }

    /// Prompts sent by answering strategies, in order.
    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| !p.starts_with(CLASSIFY_PREFIX))
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let n = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if let Some(question) = prompt
            .strip_prefix(CLASSIFY_PREFIX)
            .and_then(|rest| rest.rsplit("Question:\n").next())
        {
            if self.fail_classify {
                anyhow::bail!("classifier unavailable");
            }
            let reply = self
                .routes
                .iter()
                .find(|(needle, _)| question.contains(needle))
                .map(|(_, reply)| *reply)
                .unwrap_or("LOCAL");
            return Ok(reply.to_string());
        }

        if self.fail_answers {
            anyhow::bail!("generation failed with status 500");
        }
        Ok(format!("answer {}\n", n))
    }
}

/// Bag-of-words embedder: each lowercase word is hashed into one of 64
/// buckets. Deterministic, so equal texts get equal vectors.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn hash_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 64];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % 64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-64"
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }
}

/// Collects progress events for inspection.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<IngestProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<IngestProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl IngestProgressReporter for RecordingProgress {
    fn report(&self, event: IngestProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
