//! The conversational session and its terminal front end.
//!
//! This module provides the session controller that sequences user input
//! against the chat endpoint, the event loop that lets a front end keep
//! reacting while a reply is pending, and the pieces the `anne-chat` REPL is
//! built from.
//!
//! # Architecture
//!
//! - [`session`]: the state machine that owns the transcript
//! - [`driver`]: a task that owns a session and serializes its events
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing
//! - [`render`]: transcript output

mod commands;
mod config;
mod driver;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ConfigFile, DEFAULT_GREETING, DEFAULT_PERSONA};
pub use driver::{SessionDriver, SessionHandle};
pub use render::{PlainTextRenderer, Renderer};
pub use session::{
    IgnoreReason, OFFLINE_FALLBACK, PendingReply, REPHRASE_FALLBACK, SessionController,
    SessionSnapshot, SessionState, SessionStats, Submission, fallback_text,
};
