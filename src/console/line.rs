//! Plain line-oriented console over any reader/writer pair.

use super::{Console, ConsoleInput};
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Reads lines on a background task and hands them over a channel, so
/// waiting for input never loses a half-read line when the socket wins the
/// race.
pub struct LineConsole {
    lines: mpsc::Receiver<io::Result<ConsoleInput>>,
    output: Box<dyn AsyncWrite + Send + Unpin>,
}

impl LineConsole {
    /// Console over the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Console over an arbitrary reader and writer. Must be called from
    /// within a tokio runtime.
    pub fn new<R, W>(input: R, output: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(read_lines(input, tx));
        Self {
            lines: rx,
            output: Box::new(output),
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes).await?;
        self.output.flush().await
    }
}

async fn read_lines<R>(input: R, tx: mpsc::Sender<io::Result<ConsoleInput>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(input);
    loop {
        let mut line = Vec::new();
        let event = match reader.read_until(b'\n', &mut line).await {
            Ok(0) => Ok(ConsoleInput::Closed),
            Ok(_) => Ok(ConsoleInput::Line(line)),
            Err(e) => Err(e),
        };
        let last = !matches!(event, Ok(ConsoleInput::Line(_)));
        if tx.send(event).await.is_err() || last {
            debug!("Input reader finished");
            return;
        }
    }
}

#[async_trait]
impl Console for LineConsole {
    async fn next_input(&mut self) -> io::Result<ConsoleInput> {
        // A vanished reader task means there is no more input.
        self.lines.recv().await.unwrap_or(Ok(ConsoleInput::Closed))
    }

    async fn show_remote(&mut self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes()).await
    }

    async fn notice(&mut self, message: &str) -> io::Result<()> {
        self.write(format!("{}\n", message).as_bytes()).await
    }
}
