//! Code proposals carried in assistant replies.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// What an assistant reply proposes for the component source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "lowercase")]
pub enum Proposal {
    /// A restricted unified diff against the current source.
    Diff(String),
    /// A complete replacement of the source.
    Full(String),
}

impl Proposal {
    pub fn code(&self) -> &str {
        match self {
            Proposal::Diff(code) | Proposal::Full(code) => code,
        }
    }
}

fn diff_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```diff[^\n]*\n(.*?)```").unwrap())
}

fn source_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```(?:javascript|typescript|tsx|jsx|ts|js)\b\s*(.*?)```").unwrap()
    })
}

/// Find the proposal in a markdown reply.
///
/// A `diff` fence wins over any source fence; otherwise the first fence
/// tagged with a UI source language is a full replacement. No fence means a
/// chat-only turn.
pub fn extract_proposal(markdown: &str) -> Option<Proposal> {
    if let Some(cap) = diff_fence().captures(markdown) {
        // Leading spaces are context markers; only line breaks are trimmed.
        let body = cap[1].trim_end_matches(['\n', '\r']);
        return Some(Proposal::Diff(body.to_string()));
    }
    source_fence()
        .captures(markdown)
        .map(|cap| Proposal::Full(cap[1].trim().to_string()))
}
