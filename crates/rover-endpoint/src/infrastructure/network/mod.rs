//! Network infrastructure for the endpoint.
//!
//! Architecture:
//! - [`read_frame`] pulls one length-prefixed frame off any `AsyncRead`.
//! - [`FrameWriter`] owns the write half behind a `tokio::sync::Mutex`.  It is
//!   the only way bytes reach the socket, and it holds the lock for the whole
//!   `write_all` of one frame, so replies and streamed images never
//!   interleave.
//! - [`session::Session`] runs the handshake, the command loop and the
//!   capture loop over one connection.

pub mod session;

pub use session::{Session, SessionError, SessionOutcome, SessionSettings};

use std::sync::Arc;

use rover_core::protocol::codec::{decode_header, encode_message, FrameHeader, ProtocolError};
use rover_core::protocol::messages::{RoverMessage, HEADER_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// One frame as read from the wire: the header and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
///
/// # Errors
///
/// - `ProtocolError::Truncated` if the stream ends inside a header or payload.
/// - `SessionError::Io` for any other read failure.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    match filled {
        0 => return Ok(None),
        n if n < HEADER_SIZE => {
            return Err(ProtocolError::Truncated {
                needed: HEADER_SIZE,
                received: n,
            }
            .into())
        }
        _ => {}
    }

    let header = decode_header(&header)?;
    let needed = header.payload_len as usize;

    // `take` + `read_to_end` grows the buffer as bytes arrive instead of
    // trusting the declared length for one up-front allocation.
    let mut payload = Vec::new();
    let received = (&mut *reader)
        .take(u64::from(header.payload_len))
        .read_to_end(&mut payload)
        .await?;
    if received < needed {
        return Err(ProtocolError::Truncated { needed, received }.into());
    }

    Ok(Some(Frame { header, payload }))
}

/// Serialises outgoing frames onto one write half.
pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Encodes `message` and writes the complete frame under the write lock.
    ///
    /// Encoding happens before the lock is taken.
    pub async fn send(&self, message: &RoverMessage) -> Result<(), SessionError> {
        let bytes = encode_message(message)?;
        let mut writer = self.inner.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Flushes and shuts down the write half.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let mut writer = self.inner.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}
