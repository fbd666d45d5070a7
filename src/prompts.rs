//! Prompt templates for the classifier and the answering strategies.
//!
//! Templates use `{name}` placeholders. Substitution is a single pass, so
//! placeholder-like text inside a question or document is left alone.
//! Every template can be replaced from the `[prompts]` config section as long
//! as it keeps its required placeholders.

use anyhow::{bail, Result};

use crate::config::PromptsConfig;

pub const DEFAULT_CLASSIFY: &str = "Classify the user question.

If the question is casual conversation, greeting, or chit-chat
(e.g. hi, hello, how are you), respond with ONLY: CHAT

If the question requires understanding the document as a whole
(e.g. duration, total weeks, overall summary),
respond with ONLY: GLOBAL

If it can be answered from a specific section or topic,
respond with ONLY: LOCAL

Respond with ONLY ONE WORD.

Question:
{question}";

pub const DEFAULT_LOCAL: &str = "You are a helpful assistant.
Answer the question strictly based on the context below.

Context:
{context}

Question:
{question}
";

pub const DEFAULT_GLOBAL: &str = "You are given the complete document content below.
Answer the question accurately.

Document:
{document}

Question:
{question}

Answer:
";

const CLASSIFY_VARS: &[&str] = &["question"];
const LOCAL_VARS: &[&str] = &["context", "question"];
const GLOBAL_VARS: &[&str] = &["document", "question"];

/// The resolved template set.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub classify: String,
    pub local: String,
    pub global: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            classify: DEFAULT_CLASSIFY.to_string(),
            local: DEFAULT_LOCAL.to_string(),
            global: DEFAULT_GLOBAL.to_string(),
        }
    }
}

impl Prompts {
    /// Built-in templates with any configured overrides applied.
    pub fn from_config(config: &PromptsConfig) -> Self {
        let defaults = Self::default();
        Self {
            classify: config.classify.clone().unwrap_or(defaults.classify),
            local: config.local.clone().unwrap_or(defaults.local),
            global: config.global.clone().unwrap_or(defaults.global),
        }
    }

    pub fn render_classify(&self, question: &str) -> String {
        render(&self.classify, &[("question", question)])
    }

    pub fn render_local(&self, context: &str, question: &str) -> String {
        render(&self.local, &[("context", context), ("question", question)])
    }

    pub fn render_global(&self, document: &str, question: &str) -> String {
        render(&self.global, &[("document", document), ("question", question)])
    }
}

/// Reject overrides that drop a placeholder their stage fills in.
pub fn validate_overrides(config: &PromptsConfig) -> Result<()> {
    let checks = [
        ("classify", &config.classify, CLASSIFY_VARS),
        ("local", &config.local, LOCAL_VARS),
        ("global", &config.global, GLOBAL_VARS),
    ];
    for (name, template, vars) in checks {
        let Some(template) = template else { continue };
        for var in vars {
            if !template.contains(&format!("{{{}}}", var)) {
                bail!("prompts.{} must contain the {{{}}} placeholder", name, var);
            }
        }
    }
    Ok(())
}

/// Replace each `{name}` in `template` with its value. Unknown placeholders
/// are kept verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, value)| (*value, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
