// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framing for envelope channels.
//!
//! One frame is one envelope: a big-endian `u32` byte count, then that many
//! bytes of JSON. The count gives atomic message boundaries over a stream
//! transport; delivery order is the stream's own.

use foreman_core::Envelope;
use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Channel closed")]
    ChannelClosed,
}

/// Ceiling on a single frame (16 MB). Envelopes are small; a count anywhere
/// near this is a desynced or corrupt prefix, and rejecting it beats
/// allocating whatever the prefix claims.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Serialize an envelope into a frame payload, without the length prefix.
/// `write_message` owns the prefix.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(envelope)?;

    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: json.len(), max: MAX_MESSAGE_SIZE });
    }

    Ok(json)
}

/// Parse a frame payload back into an envelope.
pub fn decode(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Pull the next frame's payload off a stream.
///
/// EOF at a frame boundary or mid-frame both mean the peer went away and
/// surface as `ChannelClosed`, so pump loops can tell hang-ups from real IO
/// failures.
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    fill_or_closed(reader, &mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }

    let mut buf = vec![0u8; len];
    fill_or_closed(reader, &mut buf).await?;
    Ok(buf)
}

/// Frame a payload onto a stream: prefix, payload, flush.
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }

    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// `read_exact` with EOF mapped to `ChannelClosed`.
async fn fill_or_closed<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), ProtocolError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ChannelClosed)
        }
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
