//! Document ingestion: read → extract → split.
//!
//! Produces the page-level [`Document`] and its ordered [`Segment`]s in one
//! pass. Nothing is written anywhere; the only side effect is reading the
//! input file.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::chunk::segment_pages;
use crate::config::ChunkingConfig;
use crate::error::{PipelineError, Result};
use crate::extract::{content_type_for_path, extract_pages};
use crate::models::{Document, Page, Segment};

/// A document together with the segments cut from it.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub document: Document,
    pub segments: Vec<Segment>,
}

impl IngestedDocument {
    /// Whole-document text for strategies that read everything.
    pub fn full_text(&self) -> String {
        self.document.full_text()
    }
}

/// Load the file at `path` and split it according to `chunking`.
///
/// # Errors
///
/// [`PipelineError::Ingest`] when the file is unreadable, of an unsupported
/// type, fails to parse, or holds no non-whitespace text.
pub fn ingest(path: &Path, chunking: &ChunkingConfig) -> Result<IngestedDocument> {
    let content_type = content_type_for_path(path).ok_or_else(|| {
        PipelineError::ingest(
            path,
            "unsupported file type (expected .pdf, .docx, .txt or .md)",
        )
    })?;

    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::ingest(path, format!("failed to read file: {}", e)))?;

    let page_texts =
        extract_pages(&bytes, content_type).map_err(|e| PipelineError::ingest(path, e.to_string()))?;

    let pages: Vec<Page> = page_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: i as u32 + 1,
            text,
        })
        .collect();

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(PipelineError::ingest(
            path,
            "document contains no extractable text",
        ));
    }

    let segments = segment_pages(&pages, chunking.max_chars, chunking.overlap_chars);

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let fingerprint = format!("{:x}", hasher.finalize());

    tracing::info!(
        path = %path.display(),
        content_type,
        pages = pages.len(),
        segments = segments.len(),
        "ingested document"
    );

    Ok(IngestedDocument {
        document: Document {
            path: path.to_path_buf(),
            content_type: content_type.to_string(),
            fingerprint,
            pages,
        },
        segments,
    })
}
