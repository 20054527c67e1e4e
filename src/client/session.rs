//! The connection loop.
//!
//! One task waits on three things at once: data from the server, input from
//! the console, and the shutdown signal. Whichever is ready first is handled
//! to completion before waiting again.

use super::connection::Connection;
use super::decode::TextDecoder;
use crate::console::{Console, ConsoleInput};
use crate::error::{ChatError, Result};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server closed the connection.
    RemoteClosed,
    /// The user interrupted the client.
    Interrupted,
    /// Local input reached end-of-stream.
    InputClosed,
}

impl Outcome {
    /// The notice printed when the session ends this way.
    pub fn notice(&self) -> &'static str {
        match self {
            Outcome::RemoteClosed => "Server disconnected",
            Outcome::Interrupted => "\nClient terminated.",
            Outcome::InputClosed => "Input closed.",
        }
    }
}

/// A running chat session. Consumed by [`Session::run`]; a finished session
/// cannot be restarted.
pub struct Session<S = TcpStream> {
    connection: Connection<S>,
    console: Box<dyn Console>,
    decoder: TextDecoder,
    read_buffer: usize,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(connection: Connection<S>, console: Box<dyn Console>, read_buffer: usize) -> Self {
        Self {
            connection,
            console,
            decoder: TextDecoder::new(),
            read_buffer: read_buffer.max(1),
        }
    }

    /// Run until the server closes, input ends, or `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F) -> Result<Outcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let connected = format!("Connected to {}", self.connection.peer());
        self.notice(&connected).await?;

        let mut buf = vec![0u8; self.read_buffer];
        let outcome = loop {
            tokio::select! {
                read = self.connection.recv(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        let tail = self.decoder.finish();
                        self.show_remote(&tail).await?;
                        break Outcome::RemoteClosed;
                    }
                    let text = self.decoder.decode(&buf[..n]);
                    self.show_remote(&text).await?;
                }
                input = self.console.next_input() => {
                    match input.map_err(ChatError::Console)? {
                        ConsoleInput::Line(line) => self.connection.send(&line).await?,
                        ConsoleInput::Closed => break Outcome::InputClosed,
                        ConsoleInput::Interrupted => break Outcome::Interrupted,
                    }
                }
                _ = &mut shutdown => {
                    debug!("Shutdown signal received");
                    break Outcome::Interrupted;
                }
            }
        };

        info!("Session ended: {:?}", outcome);
        self.notice(outcome.notice()).await?;
        Ok(outcome)
    }

    async fn show_remote(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.console
            .show_remote(text)
            .await
            .map_err(ChatError::Console)
    }

    async fn notice(&mut self, message: &str) -> Result<()> {
        self.console
            .notice(message)
            .await
            .map_err(ChatError::Console)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connect;
    use crate::console::LineConsole;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// A console whose keyboard and screen are in-memory pipes.
    struct Harness {
        keyboard: DuplexStream,
        screen: DuplexStream,
    }

    fn console() -> (Box<dyn Console>, Harness) {
        let (keyboard, input) = tokio::io::duplex(4096);
        let (output, screen) = tokio::io::duplex(64 * 1024);
        let console = LineConsole::new(input, output);
        (Box::new(console), Harness { keyboard, screen })
    }

    async fn screen_contents(mut screen: DuplexStream) -> String {
        let mut shown = String::new();
        screen.read_to_string(&mut shown).await.unwrap();
        shown
    }

    async fn listen() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_hello_then_close() {
        let (listener, port) = listen().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hello\n").await.unwrap();
        });

        let (console, harness) = console();
        let conn = connect("127.0.0.1", port).await.unwrap();
        let outcome = Session::new(conn, console, 1024)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::RemoteClosed);
        drop(harness.keyboard);
        assert_eq!(
            screen_contents(harness.screen).await,
            format!("Connected to 127.0.0.1:{}\nhello\nServer disconnected\n", port)
        );
    }

    #[tokio::test]
    async fn test_echo_server() {
        let (listener, port) = listen().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let (console, mut harness) = console();
        harness.keyboard.write_all(b"ping\n").await.unwrap();

        let conn = connect("127.0.0.1", port).await.unwrap();
        let outcome = Session::new(conn, console, 1024)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::RemoteClosed);
        drop(harness.keyboard);
        let shown = screen_contents(harness.screen).await;
        assert!(shown.ends_with("ping\nServer disconnected\n"), "{:?}", shown);
    }

    #[tokio::test]
    async fn test_lines_forwarded_verbatim_in_order() {
        let (listener, port) = listen().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let (console, mut harness) = console();
        harness
            .keyboard
            .write_all(b"first\n\n\r\nsecond line\nno terminator")
            .await
            .unwrap();
        drop(harness.keyboard);

        let conn = connect("127.0.0.1", port).await.unwrap();
        let outcome = Session::new(conn, console, 1024)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::InputClosed);
        assert_eq!(
            server.await.unwrap(),
            b"first\n\n\r\nsecond line\nno terminator"
        );
        let shown = screen_contents(harness.screen).await;
        assert!(shown.ends_with("Input closed.\n"));
    }

    #[tokio::test]
    async fn test_output_unaltered_with_small_reads() {
        let text = "héllo wörld ✓ no newline at end";
        let (listener, port) = listen().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(text.as_bytes()).await.unwrap();
        });

        let (console, harness) = console();
        let conn = connect("127.0.0.1", port).await.unwrap();
        // One byte per read splits every multi-byte character.
        Session::new(conn, console, 1)
            .run(std::future::pending())
            .await
            .unwrap();

        drop(harness.keyboard);
        let shown = screen_contents(harness.screen).await;
        assert_eq!(
            shown,
            format!(
                "Connected to 127.0.0.1:{}\n{}Server disconnected\n",
                port, text
            )
        );
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting() {
        let (listener, port) = listen().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Stay connected and silent until the client goes away.
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let (console, harness) = console();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let conn = connect("127.0.0.1", port).await.unwrap();
        let session = tokio::spawn(Session::new(conn, console, 1024).run(async {
            let _ = stop_rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(()).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .expect("session did not stop after interrupt")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::Interrupted);
        assert!(server.await.unwrap().is_empty());

        drop(harness.keyboard);
        let shown = screen_contents(harness.screen).await;
        assert_eq!(shown.matches("Client terminated.").count(), 1);
        assert!(shown.ends_with("\nClient terminated.\n"));
    }

    /// A stream whose reads fail as if the peer reset the connection.
    struct ResetStream;

    impl AsyncRead for ResetStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        }
    }

    impl AsyncWrite for ResetStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let (console, harness) = console();
        let conn = Connection::new(ResetStream, "reset:1");
        let err = Session::new(conn, console, 1024)
            .run(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
        assert_eq!(err.exit_code(), 3);

        drop(harness.keyboard);
        let shown = screen_contents(harness.screen).await;
        assert!(!shown.contains("Server disconnected"));
    }

    #[test]
    fn test_outcome_notices() {
        assert_eq!(Outcome::RemoteClosed.notice(), "Server disconnected");
        assert_eq!(Outcome::Interrupted.notice(), "\nClient terminated.");
        assert_eq!(Outcome::InputClosed.notice(), "Input closed.");
    }
}
