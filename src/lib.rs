//! # askdoc
//!
//! Question answering over a single document.
//!
//! A document is split into overlapping segments and embedded once. Each
//! question is then classified and answered by exactly one strategy: a
//! direct chat reply, a retrieval-augmented answer from the most relevant
//! segments, or an answer over the whole document text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Document │──▶│ Extract+Split│──▶│ Segment index │
//! │ PDF/DOCX │   │   (ingest)   │   │  (embed, MMR) │
//! └──────────┘   └──────────────┘   └───────┬───────┘
//!                                           │
//!  question ──▶ Classifier ──▶ Router ──────┤
//!                              │    │       ▼
//!                            CHAT GLOBAL  LOCAL
//!                              └────┴───────┴──▶ answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askdoc ask syllabus.pdf "What is the total duration?"
//! askdoc chat syllabus.pdf
//! askdoc serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`extract`] | PDF, DOCX and text extraction |
//! | [`chunk`] | Overlapping text segmentation |
//! | [`ingest`] | Read, extract and split a document |
//! | [`http`] | Shared provider HTTP plumbing |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Language-model provider abstraction |
//! | [`index`] | In-memory segment index with MMR retrieval |
//! | [`prompts`] | Prompt templates |
//! | [`classify`] | Question classification |
//! | [`strategy`] | CHAT, LOCAL and GLOBAL answering strategies |
//! | [`router`] | Classify-then-dispatch routing |
//! | [`pipeline`] | Ingest → index → router assembly |
//! | [`session`] | Per-conversation state |
//! | [`progress`] | Load progress reporting |
//! | [`server`] | HTTP session server |

pub mod chunk;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod router;
pub mod server;
pub mod session;
pub mod strategy;
