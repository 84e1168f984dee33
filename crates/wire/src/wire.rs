// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Frame, Input, Request};

/// Upper bound on a single message, to reject garbage length prefixes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Serialize a message to JSON (no length prefix).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Deserialize a message from JSON (no length prefix).
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message.
///
/// EOF before the prefix is a clean close and maps to `ConnectionClosed`.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(buf)
}

/// Write one length-prefixed message and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: data.len(), max: MAX_MESSAGE_SIZE });
    }
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_json<R, T>(reader: &mut R, timeout: Option<Duration>) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let bytes = match timeout {
        Some(limit) => tokio::time::timeout(limit, read_message(reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??,
        None => read_message(reader).await?,
    };
    decode(&bytes)
}

async fn write_json<W, T>(writer: &mut W, msg: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(msg)?;
    tokio::time::timeout(timeout, write_message(writer, &bytes))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Read a request (agent side).
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    read_json(reader, Some(timeout)).await
}

/// Write a request (client side).
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &Request,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    write_json(writer, request, timeout).await
}

/// Write a response frame (agent side).
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    write_json(writer, frame, timeout).await
}

/// Read a response frame (client side).
///
/// `None` waits indefinitely: board commands may legitimately run for a
/// long time, or queue behind another session.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Option<Duration>,
) -> Result<Frame, ProtocolError> {
    read_json(reader, timeout).await
}

/// Write interactive input (client side).
pub async fn write_input<W: AsyncWrite + Unpin>(
    writer: &mut W,
    input: &Input,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    write_json(writer, input, timeout).await
}

/// Read interactive input (agent side). Blocks until the client sends or
/// disconnects.
pub async fn read_input<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Input, ProtocolError> {
    read_json(reader, None).await
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
