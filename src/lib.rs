// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod input;
pub mod observability;
pub mod transcript;

// Re-exports
pub use client::{
    ChatRequest, ChatResponse, FailureKind, HttpResponseClient, RemoteOutcome, ResponseClient,
    parse_reply,
};
pub use client_logger::{ClientLogger, StderrLogger};
pub use error::{Error, Result};
pub use input::InputBuffer;
pub use observability::register_biometrics;
pub use transcript::{Sender, Transcript, Turn, TurnId};
