//! Running chat transcript between the operator and the assistant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn push_user(&mut self, content: &str) {
        self.turns.push(ChatTurn::user(content));
    }

    pub fn push_assistant(&mut self, content: &str) {
        self.turns.push(ChatTurn::assistant(content));
    }

    /// Show `accumulated` as the in-progress assistant turn.
    ///
    /// The trailing assistant turn is replaced rather than appended to, so a
    /// stream of growing prefixes leaves exactly one assistant turn.
    pub fn apply_delta(&mut self, accumulated: &str) {
        match self.turns.last_mut() {
            Some(turn) if turn.role == Role::Assistant => {
                turn.content.clear();
                turn.content.push_str(accumulated);
            }
            _ => self.push_assistant(accumulated),
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
