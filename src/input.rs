//! The draft the user is composing.
//!
//! The presentation layer owns an [`InputBuffer`] and writes keystrokes into
//! it. The session decides when the draft is consumed: a submission that is
//! accepted clears it, an ignored one leaves it intact, and the buffer refuses
//! edits while a reply is pending.

use crate::chat::{SessionState, Submission};

/// Holds the in-progress draft text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBuffer {
    draft: String,
    enabled: bool,
}

impl InputBuffer {
    /// Creates an empty, enabled buffer.
    pub fn new() -> Self {
        Self {
            draft: String::new(),
            enabled: true,
        }
    }

    /// The current draft.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replaces the draft. Returns false if input is disabled.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        if !self.enabled {
            return false;
        }
        self.draft = text.into();
        true
    }

    /// Appends to the draft. Returns false if input is disabled.
    pub fn push_str(&mut self, text: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.draft.push_str(text);
        true
    }

    /// Whether the user may currently edit.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a send affordance should be offered.
    pub fn can_send(&self) -> bool {
        self.enabled && !self.draft.trim().is_empty()
    }

    /// Follows the session: editable only while idle.
    pub fn sync(&mut self, state: SessionState) {
        self.enabled = state == SessionState::Idle;
    }

    /// Applies the session's verdict on the draft that was just submitted.
    ///
    /// Clears the draft only when the submission was dispatched.
    pub fn acknowledge(&mut self, submission: &Submission) {
        if submission.is_dispatched() {
            self.draft.clear();
            self.enabled = false;
        }
    }

    /// Removes and returns the draft.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatConfig, SessionController};

    #[test]
    fn new_buffer_is_empty_and_enabled() {
        let buffer = InputBuffer::new();
        assert_eq!(buffer.draft(), "");
        assert!(buffer.is_enabled());
        assert!(!buffer.can_send());
    }

    #[test]
    fn default_buffer_accepts_edits() {
        let mut buffer = InputBuffer::default();
        assert_eq!(buffer, InputBuffer::new());
        assert!(buffer.is_enabled());
        assert!(buffer.set("hi"));
        assert_eq!(buffer.draft(), "hi");
    }

    #[test]
    fn whitespace_draft_cannot_send() {
        let mut buffer = InputBuffer::new();
        assert!(buffer.set("   \t"));
        assert!(!buffer.can_send());
        assert!(buffer.push_str("hi"));
        assert!(buffer.can_send());
    }

    #[test]
    fn accepted_submission_clears_and_disables() {
        let mut controller = SessionController::new(&ChatConfig::new());
        let mut buffer = InputBuffer::new();
        buffer.set("Hello");

        let submission = controller.submit(buffer.draft());
        buffer.acknowledge(&submission);

        assert_eq!(buffer.draft(), "");
        assert!(!buffer.is_enabled());
        assert!(!buffer.set("typing while busy"));
        assert_eq!(buffer.draft(), "");
    }

    #[test]
    fn ignored_submission_keeps_draft() {
        let mut controller = SessionController::new(&ChatConfig::new());
        let mut buffer = InputBuffer::new();
        buffer.set("   ");

        let submission = controller.submit(buffer.draft());
        buffer.acknowledge(&submission);

        assert_eq!(buffer.draft(), "   ");
        assert!(buffer.is_enabled());
    }

    #[test]
    fn sync_follows_session_state() {
        let mut buffer = InputBuffer::new();
        buffer.sync(SessionState::AwaitingReply);
        assert!(!buffer.is_enabled());
        buffer.sync(SessionState::Idle);
        assert!(buffer.is_enabled());
    }

    #[test]
    fn take_empties_draft() {
        let mut buffer = InputBuffer::new();
        buffer.set("draft");
        assert_eq!(buffer.take(), "draft");
        assert_eq!(buffer.draft(), "");
    }
}
