//! In-memory segment index with diversity-aware retrieval.
//!
//! [`SegmentIndex::build`] embeds every segment once; the index is immutable
//! afterwards and can be shared behind an `Arc`. [`SegmentIndex::search`]
//! runs a two-stage query:
//!
//! 1. Rank all segments by cosine similarity to the question and keep the
//!    best `fetch_k` candidates.
//! 2. Pick up to `k` of them with Maximal Marginal Relevance:
//!
//! ```text
//! mmr(c) = (1 - diversity) × sim(q, c) - diversity × max sim(c, s)
//!                                                   s ∈ selected
//! ```
//!
//! `diversity = 0.0` is plain top-k; larger values penalise candidates that
//! repeat what was already selected.

use std::sync::Arc;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{PipelineError, Result};
use crate::models::Segment;

pub struct SegmentIndex {
    segments: Vec<Segment>,
    vectors: Vec<Vec<f32>>,
    model: String,
}

impl std::fmt::Debug for SegmentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentIndex")
            .field("segments", &self.segments.len())
            .field("dims", &self.dims())
            .field("model", &self.model)
            .finish()
    }
}

impl SegmentIndex {
    /// Embed `segments` in batches of `batch_size` and store the vectors.
    ///
    /// `on_batch` is called after each batch with `(embedded, total)`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Index`] when there are no segments, the embedder
    /// fails, or it returns the wrong number of vectors or mixed dimensions.
    pub async fn build(
        embedder: &Arc<dyn Embedder>,
        segments: Vec<Segment>,
        batch_size: usize,
        mut on_batch: impl FnMut(usize, usize),
    ) -> Result<Self> {
        if segments.is_empty() {
            return Err(PipelineError::Index("no segments to index".to_string()));
        }

        let total = segments.len();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(total);

        for batch in segments.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
            let embedded = embedder
                .embed(&texts)
                .await
                .map_err(|e| PipelineError::Index(format!("embedding failed: {:#}", e)))?;

            if embedded.len() != batch.len() {
                return Err(PipelineError::Index(format!(
                    "embedder returned {} vectors for {} segments",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
            on_batch(vectors.len(), total);
        }

        let dims = vectors[0].len();
        if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
            return Err(PipelineError::Index(
                "embedder returned vectors of inconsistent dimensionality".to_string(),
            ));
        }

        tracing::info!(
            segments = total,
            dims,
            model = embedder.model_name(),
            "built segment index"
        );

        Ok(Self {
            segments,
            vectors,
            model: embedder.model_name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.vectors.first().map(Vec::len).unwrap_or(0)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Retrieve up to `k` segments for `question`, in selection order.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Index`] when the query embedding fails or its
    /// dimensionality does not match the index.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        question: &str,
        k: usize,
        fetch_k: usize,
        diversity: f32,
    ) -> Result<Vec<Segment>> {
        let query = embedder
            .embed_query(question)
            .await
            .map_err(|e| PipelineError::Index(format!("query embedding failed: {:#}", e)))?;

        if query.len() != self.dims() {
            return Err(PipelineError::Index(format!(
                "query embedding has {} dimensions, index has {}",
                query.len(),
                self.dims()
            )));
        }

        let picked = self.select(&query, k, fetch_k, diversity);
        tracing::debug!(
            candidates = fetch_k.min(self.len()),
            selected = picked.len(),
            "retrieved segments"
        );
        Ok(picked
            .into_iter()
            .map(|i| self.segments[i].clone())
            .collect())
    }

    /// Candidate ranking plus MMR selection; returns positions into `segments`.
    fn select(&self, query: &[f32], k: usize, fetch_k: usize, diversity: f32) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();
        // Stable sort keeps document order among equal scores.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(fetch_k.max(k));

        mmr_select(&ranked, &self.vectors, k, diversity)
    }
}

/// Greedy MMR over `candidates` (position, relevance), best first.
fn mmr_select(
    candidates: &[(usize, f32)],
    vectors: &[Vec<f32>],
    k: usize,
    diversity: f32,
) -> Vec<usize> {
    let diversity = diversity.clamp(0.0, 1.0);
    let k = k.min(candidates.len());
    let mut remaining: Vec<(usize, f32)> = candidates.to_vec();
    let mut selected: Vec<usize> = Vec::with_capacity(k);

    while selected.len() < k {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &(idx, relevance)) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(&vectors[idx], &vectors[s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let score = (1.0 - diversity) * relevance - diversity * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        let (idx, _) = remaining.remove(best_pos);
        selected.push(idx);
    }

    selected
}
