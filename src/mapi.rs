//! MAPI chunk framing and the stub challenge/error exchange.
//!
//! This is not a reimplementation of MonetDB's MAPI protocol — only enough
//! of its wire framing to give a client something to observe a completed
//! handshake by: one challenge, one logical request read, one error reply.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// The fixed challenge blob sent immediately after a connection is
/// accepted (after the TLS handshake, if any).
pub const CHALLENGE: &str =
    "s7NzFDHo0UdlE:merovingian:9:RIPEMD160,SHA512,SHA384,SHA256,SHA224,SHA1:LIT:SHA512:";

/// The fixed error reply sent after reading the client's one logical
/// message.
pub const ERROR_REPLY: &str = "!Sorry, this is not a real MonetDB instance";

/// Maximum chunk body size: the header encodes `size` in its upper 15 bits.
const MAX_CHUNK_SIZE: usize = (1 << 15) - 1;

/// Write `message` as a single framed chunk with the `last` bit set.
///
/// # Errors
///
/// Returns an error if `message` exceeds [`MAX_CHUNK_SIZE`] or the
/// underlying write fails.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &[u8]) -> Result<()> {
    if message.len() > MAX_CHUNK_SIZE {
        return Err(Error::Protocol(format!(
            "message of {} bytes exceeds max chunk size {MAX_CHUNK_SIZE}",
            message.len()
        )));
    }
    let header = ((message.len() as u16) << 1) | 1;
    writer.write_all(&header.to_le_bytes()).await?;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one logical message: consume framed chunks until one with the
/// `last` flag set is seen.
///
/// A zero-length last chunk legitimately terminates a message — `last` is
/// authoritative regardless of `size`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the connection is closed before a `last`
/// chunk is seen (an incomplete message), or [`Error::Io`] on a read
/// failure.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut message = Vec::new();
    loop {
        let mut header_bytes = [0u8; 2];
        match reader.read_exact(&mut header_bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::Protocol(
                    "connection closed before a complete message was received".to_string(),
                ));
            }
            Err(e) => return Err(Error::Io(e)),
        }
        let header = u16::from_le_bytes(header_bytes);
        let size = usize::from(header >> 1);
        let last = header & 1 == 1;

        let mut body = vec![0u8; size];
        reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Protocol("connection closed mid-chunk body".to_string())
            } else {
                Error::Io(e)
            }
        })?;
        message.extend_from_slice(&body);

        if last {
            return Ok(message);
        }
    }
}
