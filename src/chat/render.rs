//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows
//! for different output styles. The default implementation uses ANSI
//! escape codes to tell the persona's turns apart from the user's and to
//! dim the typing indicator.

use std::io::{self, Write};

use crate::transcript::{Sender, Turn};

/// ANSI escape code for dim text (used for the typing indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the persona).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Print one transcript turn.
    fn print_turn(&mut self, turn: &Turn);

    /// Show that a reply is pending.
    fn print_typing(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = io::Stdout> {
    out: W,
    persona: String,
    use_color: bool,
    typing: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new(persona: impl Into<String>) -> Self {
        Self::with_color(persona, true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(persona: impl Into<String>, use_color: bool) -> Self {
        Self::with_writer(io::stdout(), persona, use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, persona: impl Into<String>, use_color: bool) -> Self {
        Self {
            out,
            persona: persona.into(),
            use_color,
            typing: false,
        }
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn label(&self, sender: Sender) -> &str {
        match sender {
            Sender::User => "You",
            Sender::Assistant => &self.persona,
        }
    }

    fn clear_typing(&mut self) {
        if self.typing {
            if self.use_color {
                let _ = write!(self.out, "\r\x1b[2K");
            } else {
                let _ = writeln!(self.out);
            }
            self.typing = false;
        }
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_turn(&mut self, turn: &Turn) {
        self.clear_typing();
        let label = self.label(turn.sender).to_string();
        let _ = match (self.use_color, turn.sender) {
            (true, Sender::Assistant) => writeln!(
                self.out,
                "{ANSI_BOLD}{ANSI_CYAN}{label}:{ANSI_RESET} {ANSI_CYAN}{}{ANSI_RESET}",
                turn.text
            ),
            (true, Sender::User) => {
                writeln!(self.out, "{ANSI_BOLD}{label}:{ANSI_RESET} {}", turn.text)
            }
            (false, _) => writeln!(self.out, "{label}: {}", turn.text),
        };
        let _ = self.out.flush();
    }

    fn print_typing(&mut self) {
        if self.typing {
            return;
        }
        let persona = self.persona.clone();
        let _ = if self.use_color {
            write!(self.out, "{ANSI_DIM}{persona} is typing...{ANSI_RESET}")
        } else {
            write!(self.out, "{persona} is typing...")
        };
        self.typing = true;
        let _ = self.out.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.clear_typing();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.clear_typing();
        let _ = writeln!(self.out, "{info}");
        let _ = self.out.flush();
    }
}
