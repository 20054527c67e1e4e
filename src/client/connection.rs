//! TCP connection to the chat server.

use crate::error::{ChatError, Result};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// A connected byte stream to the chat server.
///
/// Generic over the stream so the session loop can be driven by in-memory
/// pipes as well as real sockets.
pub struct Connection<S = TcpStream> {
    stream: S,
    peer: String,
}

/// Connect to `host:port`, trying every resolved address in turn.
pub async fn connect(host: &str, port: u16) -> Result<Connection> {
    let peer = format!("{}:{}", host, port);
    debug!("Connecting to {}", peer);

    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| ChatError::Connect {
            addr: peer.clone(),
            source,
        })?;

    // Each typed line should leave immediately rather than wait on Nagle.
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    match stream.peer_addr() {
        Ok(addr) => info!("Connected to {} ({})", peer, addr),
        Err(_) => info!("Connected to {}", peer),
    }

    Ok(Connection { stream, peer })
}

/// Like [`connect`], but gives up if `shutdown` resolves first. Returns
/// `None` when interrupted.
pub async fn connect_until<F>(host: &str, port: u16, shutdown: F) -> Result<Option<Connection>>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = shutdown => {
            debug!("Interrupted while connecting to {}:{}", host, port);
            Ok(None)
        }
        conn = connect(host, port) => conn.map(Some),
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already established stream.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }

    /// The `host:port` this connection was opened against.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write every byte of `data` and flush. An empty payload is a no-op
    /// write.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(ChatError::Transport)?;
        self.stream.flush().await.map_err(ChatError::Transport)?;
        debug!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Read whatever is available, up to `buf.len()` bytes. Zero means the
    /// server closed the stream.
    ///
    /// Cancel safe: dropping the future before it completes loses no data.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.stream.read(buf).await.map_err(ChatError::Transport)?;
        debug!("Received {} bytes", n);
        Ok(n)
    }
}
