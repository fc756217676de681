//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, an optional YAML
//! configuration file, and the resolved [`ChatConfig`] that sessions and
//! clients are built from. Flags take precedence over the file; the file
//! takes precedence over built-in defaults.

use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};

/// Greeting seeded as the first assistant turn.
pub const DEFAULT_GREETING: &str =
    "Hello, I'm here to listen. What would you like to talk about?";

/// Display name of the persona.
pub const DEFAULT_PERSONA: &str = "Anne";

/// Command-line arguments for the anne-chat tool.
///
/// Flags override the configuration file. `--include-history` can only turn
/// forwarding on; a file that enables it is switched off at runtime with
/// `/history off`.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Chat endpoint URL.
    #[arrrg(optional, "Chat endpoint (default: http://127.0.0.1:8000/api/chat)", "URL")]
    pub endpoint: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Forward earlier questions with every request.
    #[arrrg(flag, "Send a numbered list of earlier questions with each request")]
    pub include_history: bool,

    /// Per-request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 30)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log every request and outcome to stderr.
    #[arrrg(flag, "Log requests and outcomes to stderr")]
    pub log_requests: bool,
}

/// The on-disk configuration file.
///
/// Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Chat endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Forward earlier questions with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_history: Option<bool>,
    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Opening assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    /// Persona display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    /// Whether to use ANSI styling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_color: Option<bool>,
}

impl ConfigFile {
    /// Reads and parses a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config {}", path.display()), err)
        })?;
        Self::from_yaml(&content)
    }

    /// Parses YAML configuration text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// the configuration file and command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Where requests are posted.
    pub endpoint: String,

    /// Whether each request carries the numbered list of prior user turns.
    /// Off by default: only the latest query is sent.
    pub include_history: bool,

    /// Per-request timeout; expiry counts as a network failure.
    pub timeout: Duration,

    /// Text of the seeded assistant turn.
    pub greeting: String,

    /// Display name used when rendering assistant turns.
    pub persona: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to log requests and outcomes to stderr.
    pub log_requests: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: http://127.0.0.1:8000/api/chat
    /// - History: not forwarded
    /// - Timeout: 30 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            include_history: false,
            timeout: DEFAULT_TIMEOUT,
            greeting: DEFAULT_GREETING.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            use_color: true,
            log_requests: false,
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets whether prior user turns are forwarded.
    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the persona name.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Overlays the keys present in `file`.
    pub fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(include_history) = file.include_history {
            self.include_history = include_history;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(greeting) = file.greeting {
            self.greeting = greeting;
        }
        if let Some(persona) = file.persona {
            self.persona = persona;
        }
        if let Some(use_color) = file.use_color {
            self.use_color = use_color;
        }
        self
    }

    /// Checks the values a session cannot run without.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)?;
        if self.timeout.is_zero() {
            return Err(Error::validation(
                "timeout must be greater than zero",
                Some("timeout_secs".to_string()),
            ));
        }
        if self.greeting.trim().is_empty() {
            return Err(Error::validation(
                "greeting must not be empty",
                Some("greeting".to_string()),
            ));
        }
        if self.persona.trim().is_empty() {
            return Err(Error::validation(
                "persona must not be empty",
                Some("persona".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(path) = &args.config {
            config = config.merge_file(ConfigFile::from_file(path)?);
        }
        if let Some(endpoint) = args.endpoint {
            config.endpoint = endpoint;
        }
        if args.include_history {
            config.include_history = true;
        }
        if let Some(secs) = args.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if args.no_color {
            config.use_color = false;
        }
        config.log_requests = args.log_requests;
        config.validate()?;
        Ok(config)
    }
}
