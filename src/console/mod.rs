//! Local side of the chat: where typed lines come from and where server
//! output is shown.
//!
//! - [`LineConsole`] reads standard input line by line (the default).
//! - [`EditorConsole`] puts the terminal in raw mode and edits the line
//!   locally, keeping it on screen while server text scrolls above it.

pub mod editor;
pub mod line;

pub use editor::EditorConsole;
pub use line::LineConsole;

use crate::config::ClientConfig;
use async_trait::async_trait;
use std::io;
use tracing::warn;

/// Something the user did on the local side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// A complete line, terminator included, to forward as-is.
    Line(Vec<u8>),
    /// Local input reached end-of-stream.
    Closed,
    /// The user asked to quit (Ctrl-C in raw mode).
    Interrupted,
}

/// The local input stream and display used by the session loop.
#[async_trait]
pub trait Console: Send {
    /// Wait for the next input.
    ///
    /// Must be cancel safe: the session races this against the socket and
    /// drops it whenever the socket wins.
    async fn next_input(&mut self) -> io::Result<ConsoleInput>;

    /// Display text received from the server, verbatim.
    async fn show_remote(&mut self, text: &str) -> io::Result<()>;

    /// Display a one-line status message.
    async fn notice(&mut self, message: &str) -> io::Result<()>;
}

/// Pick the console for this run. The editor needs a terminal on stdin;
/// without one we fall back to line input.
pub fn create_console(config: &ClientConfig) -> Box<dyn Console> {
    if config.editor {
        if atty::is(atty::Stream::Stdin) {
            match EditorConsole::new(config.max_line, config.prompt.clone()) {
                Ok(console) => return Box::new(console),
                Err(e) => warn!("Cannot start line editor, using plain input: {}", e),
            }
        } else {
            warn!("stdin is not a terminal, using plain input");
        }
    }
    Box::new(LineConsole::stdio())
}
