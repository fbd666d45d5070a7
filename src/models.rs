//! Core data models shared by the ingestion, retrieval and answering stages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One page of extracted text. Plain-text sources produce a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

/// A loaded source document. Read-only once created.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub content_type: String,
    /// SHA-256 of the source bytes, hex-encoded.
    pub fingerprint: String,
    pub pages: Vec<Page>,
}

/// Separator placed between pages when the whole document is rendered.
pub const PAGE_SEPARATOR: &str = "\n\n";

impl Document {
    /// All page texts joined in order with [`PAGE_SEPARATOR`].
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }
}

/// A bounded slice of a page, used as the retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Position in the document-wide segment sequence, starting at 0.
    pub index: usize,
    /// Page the slice was taken from (1-based).
    pub page: u32,
    /// Offset of the first character within the page, in chars.
    pub char_offset: usize,
    pub text: String,
}

/// Which answering strategy handles a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteLabel {
    Chat,
    Local,
    Global,
}

impl RouteLabel {
    pub const ALL: [RouteLabel; 3] = [RouteLabel::Chat, RouteLabel::Local, RouteLabel::Global];

    /// The exact token the classifier prompt asks the model to emit.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::Chat => "CHAT",
            RouteLabel::Local => "LOCAL",
            RouteLabel::Global => "GLOBAL",
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Append-only conversation history for one session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            text: text.into(),
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// The outcome of one routed question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub route: RouteLabel,
    pub text: String,
}
