//! Error taxonomy for the chat client.
//!
//! Every error is terminal for the process. Each kind maps to its own exit
//! status so an operator can tell them apart.

use std::io;
use thiserror::Error;

/// Exit status for a clean shutdown (remote close, interrupt, end of input).
pub const EXIT_OK: i32 = 0;

/// Errors that end a chat session.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad command line: wrong argument count, empty host or invalid port.
    #[error("{0}")]
    Usage(String),

    /// The initial connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A read or write on the established connection failed.
    #[error("connection I/O error: {0}")]
    Transport(#[source] io::Error),

    /// Reading local input or writing to the display failed.
    #[error("console I/O error: {0}")]
    Console(#[source] io::Error),

    /// The configuration file could not be loaded.
    #[error("configuration error: {0:#}")]
    Config(#[source] anyhow::Error),
}

impl ChatError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ChatError::Usage(_) => 1,
            ChatError::Connect { .. } => 2,
            ChatError::Transport(_) => 3,
            ChatError::Console(_) => 4,
            ChatError::Config(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
