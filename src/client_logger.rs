//! Logging trait for response client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log every call passing through the [`HttpResponseClient`](crate::HttpResponseClient).

use std::io::{self, Write};
use std::sync::Mutex;

use url::Url;

use crate::client::{ChatRequest, RemoteOutcome};

/// A trait for logging response client operations.
///
/// # Example
///
/// ```rust,ignore
/// use anne::{ChatRequest, ClientLogger, RemoteOutcome};
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, endpoint: &url::Url, request: &ChatRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "POST {endpoint} {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_outcome(&self, _: &ChatRequest, outcome: &RemoteOutcome, detail: Option<&str>) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{outcome:?} {}", detail.unwrap_or("")).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, endpoint: &Url, request: &ChatRequest);

    /// Log the classified outcome of a request.
    ///
    /// `detail` carries the underlying transport, status, or parse message
    /// for failures; it is `None` on success.
    fn log_outcome(&self, request: &ChatRequest, outcome: &RemoteOutcome, detail: Option<&str>);
}

/// Writes one line per request and per outcome to stderr.
#[derive(Default)]
pub struct StderrLogger {
    lock: Mutex<()>,
}

impl StderrLogger {
    /// Creates a new stderr logger.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientLogger for StderrLogger {
    fn log_request(&self, endpoint: &Url, request: &ChatRequest) {
        let _guard = self.lock.lock();
        let body = serde_json::to_string(request).unwrap_or_else(|e| format!("<{e}>"));
        let _ = writeln!(io::stderr(), "[anne] POST {endpoint} {body}");
    }

    fn log_outcome(&self, _: &ChatRequest, outcome: &RemoteOutcome, detail: Option<&str>) {
        let _guard = self.lock.lock();
        let mut stderr = io::stderr();
        match (outcome, detail) {
            (RemoteOutcome::Success(reply), _) => {
                let _ = writeln!(stderr, "[anne] ok ({} bytes)", reply.len());
            }
            (RemoteOutcome::Failure(kind), Some(detail)) => {
                let _ = writeln!(stderr, "[anne] {kind}: {detail}");
            }
            (RemoteOutcome::Failure(kind), None) => {
                let _ = writeln!(stderr, "[anne] {kind}");
            }
        }
    }
}
