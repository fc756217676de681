//! The append-only conversation log.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordinal identifier of a turn within a session.
pub type TurnId = u64;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Text the user submitted.
    User,
    /// Text produced by the persona, or a fallback standing in for it.
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique, strictly increasing within a session.
    pub id: TurnId,
    /// Never empty.
    pub text: String,
    /// The author of this turn.
    pub sender: Sender,
}

impl Turn {
    /// Creates a user turn.
    pub fn user(id: TurnId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::User,
        }
    }

    /// Creates an assistant turn.
    pub fn assistant(id: TurnId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::Assistant,
        }
    }

    /// Returns true if the user wrote this turn.
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// An ordered log of turns.
///
/// There is no way to remove, reorder, or edit a turn once appended. Id
/// assignment is the owner's job; the transcript only records order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `turn` after every existing entry.
    pub fn append(&mut self, turn: Turn) {
        debug_assert!(
            self.turns.last().is_none_or(|last| last.id < turn.id),
            "turn ids must increase"
        );
        self.turns.push(turn);
    }

    /// All turns in append order.
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns recorded.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Iterates over the user turns in order.
    pub fn user_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.is_user())
    }
}
