// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed envelope endpoints over any async byte stream.
//!
//! The supervisor holds one `ChannelReader`/`ChannelWriter` pair per child
//! (a pump task each). The worker runtime holds a whole `Channel` over its
//! end of the socket.

use crate::wire::{decode, encode, read_message, write_message, ProtocolError};
use foreman_core::Envelope;
use tokio::io::{AsyncRead, AsyncWrite};

/// Receiving half of a duplex envelope channel.
pub struct ChannelReader<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> ChannelReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next envelope. `ChannelClosed` means the peer hung up.
    pub async fn recv(&mut self) -> Result<Envelope, ProtocolError> {
        let bytes = read_message(&mut self.reader).await?;
        decode(&bytes)
    }
}

/// Sending half of a duplex envelope channel.
pub struct ChannelWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ChannelWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one envelope as a single frame.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let bytes = encode(envelope)?;
        write_message(&mut self.writer, &bytes).await
    }
}

/// Both halves of a duplex envelope channel over a single stream.
pub struct Channel<R, W> {
    reader: ChannelReader<R>,
    writer: ChannelWriter<W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Channel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader: ChannelReader::new(reader), writer: ChannelWriter::new(writer) }
    }

    pub async fn recv(&mut self) -> Result<Envelope, ProtocolError> {
        self.reader.recv().await
    }

    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), ProtocolError> {
        self.writer.send(envelope).await
    }

    /// Take the halves apart (independent pump tasks).
    pub fn split(self) -> (ChannelReader<R>, ChannelWriter<W>) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
