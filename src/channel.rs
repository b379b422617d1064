use std::io;

use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cipher;
use crate::MAX_MESSAGE_SIZE;

/// One logical message per send/receive, obfuscation applied
/// transparently in both directions.
///
/// Framing is an explicit u32 length prefix followed by the obfuscated
/// payload, so a message never splits across reads or coalesces with its
/// neighbor regardless of how the transport segments the byte stream.
/// The same primitive carries command text and raw file chunks; there is
/// no separate binary mode.
///
/// Generic over the stream so sessions run on `TcpStream` and tests run
/// on `tokio::io::duplex`.
pub struct MessageChannel<S> {
    stream: S,
    key: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageChannel<S> {
    pub fn new(stream: S, key: &[u8]) -> Self {
        debug_assert!(!key.is_empty(), "obfuscation key must be non-empty");
        MessageChannel {
            stream,
            key: key.to_vec(),
        }
    }

    /// Obfuscates and writes one message. Fails if the message exceeds
    /// the maximum message size or the transport cannot deliver it.
    pub async fn send(&mut self, message: &[u8]) -> io::Result<()> {
        if message.len() > MAX_MESSAGE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "message of {} bytes exceeds maximum of {}",
                    message.len(),
                    MAX_MESSAGE_SIZE
                ),
            ));
        }

        let obfuscated = cipher::apply(message, &self.key);
        self.stream.write_u32(obfuscated.len() as u32).await?;
        self.stream.write_all(&obfuscated).await?;
        self.stream.flush().await?;
        trace!("sent message: {} bytes", message.len());
        Ok(())
    }

    pub async fn send_str(&mut self, message: &str) -> io::Result<()> {
        self.send(message.as_bytes()).await
    }

    /// Reads one message, returning `None` when the peer is gone.
    ///
    /// Clean close means EOF exactly at a message boundary: zero bytes
    /// of the next length prefix. A connection that dies inside the
    /// prefix or the payload is a framing error and is surfaced. A
    /// length above the maximum message size is a protocol violation.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; 4];
        let mut filled = 0;
        while filled < prefix.len() {
            let bytes_read = match self.stream.read(&mut prefix[filled..]).await {
                Ok(bytes_read) => bytes_read,
                Err(e) if filled == 0 && is_disconnect(&e) => {
                    trace!("peer closed the connection");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            if bytes_read == 0 {
                if filled == 0 {
                    trace!("peer closed the connection");
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside a message length prefix",
                ));
            }
            filled += bytes_read;
        }
        let length = u32::from_be_bytes(prefix) as usize;

        if length > MAX_MESSAGE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "announced message of {} bytes exceeds maximum of {}",
                    length, MAX_MESSAGE_SIZE
                ),
            ));
        }

        let mut buffer = vec![0; length];
        self.stream.read_exact(&mut buffer).await?;
        trace!("received message: {} bytes", length);
        Ok(Some(cipher::apply(&buffer, &self.key)))
    }

    /// Shuts down the write direction of the transport. The read
    /// direction stays open, so a peer can half-close mid-transfer and
    /// still collect the final verdict.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    /// Convenience wrapper for textual responses and commands.
    pub async fn recv_text(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .recv()
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
