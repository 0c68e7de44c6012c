//! Output rendering for the chat loop.
//!
//! This module provides the renderer trait the chat loop writes through and a
//! plain-text implementation with optional ANSI styling.

use std::io::{self, Stdout, Write};

use crate::chat::Session;

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for session names).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for interruptions).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering answers and status messages.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Test doubles that record what was shown
pub trait Renderer: Send {
    /// Called before the answer for `session` begins.
    fn start_response(&mut self, session: &str) {
        _ = session;
    }

    /// Called after each streamed fragment.
    ///
    /// `cumulative` is the whole answer so far; `fragment` is its newest
    /// suffix.
    fn render_progress(&mut self, cumulative: &str, fragment: &str);

    /// Called once the answer is complete.
    ///
    /// Renderers must show any part of `answer` not yet rendered, which is all
    /// of it for single-shot answers.
    fn finish_response(&mut self, answer: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the answer is interrupted by the user.
    fn print_interrupted(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
///
/// Answers are written to the wrapped writer (stdout by default); errors go
/// to stderr.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    rendered: usize,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            rendered: 0,
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_response(&mut self, _session: &str) {
        self.rendered = 0;
    }

    fn render_progress(&mut self, cumulative: &str, _fragment: &str) {
        if let Some(suffix) = cumulative.get(self.rendered..) {
            self.write(suffix);
        }
        self.rendered = cumulative.len();
    }

    fn finish_response(&mut self, answer: &str) {
        if let Some(rest) = answer.get(self.rendered..) {
            self.write(rest);
        }
        self.rendered = 0;
        self.write("\n\n");
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.styled(ANSI_RED, &format!("Error: {error}")));
    }

    fn print_info(&mut self, info: &str) {
        let line = self.styled(ANSI_DIM, info);
        self.write(&format!("{line}\n"));
    }

    fn print_interrupted(&mut self) {
        self.rendered = 0;
        let line = self.styled(ANSI_YELLOW, "[interrupted]");
        self.write(&format!("\n{line}\n"));
    }
}

/// The line-editor prompt for `session`: `"<name> <turns> > "`.
pub fn prompt_label(session: &Session) -> String {
    format!("{} {} > ", session.name(), session.turn_count())
}

/// A one-line description of `session` for listings.
pub fn describe_session(session: &Session, current: bool, use_color: bool) -> String {
    let marker = if current { "*" } else { " " };
    let name = if use_color {
        format!("{ANSI_CYAN}{}{ANSI_RESET}", session.name())
    } else {
        session.name().to_string()
    };
    let prompt = if session.prompt_name().is_empty() {
        "-"
    } else {
        session.prompt_name()
    };
    let context = if session.is_contextless() { "off" } else { "on" };
    format!(
        "{marker} {name}  turns={} prompt={prompt} context={context}",
        session.turn_count()
    )
}
