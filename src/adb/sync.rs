//! Sync sub-protocol spoken after a `sync:` command.
//!
//! Unlike host commands, every length here is a binary little-endian `u32`:
//!
//! ```text
//! request  := id[4] len[4] path[len]
//! chunk    := "DATA" len[4] bytes[len]
//! end      := "DONE" trailer[4]
//! status   := "OKAY" 0[4] | "FAIL" len[4] message[len]
//! ```

use crate::core::types::{RemoteFile, DEFAULT_FILE_MODE};
use crate::error::{AdbError, Result, SyncError};
use bytes::{Bytes, BytesMut};
use log::*;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DATA: &[u8; 4] = b"DATA";
pub const DONE: &[u8; 4] = b"DONE";
pub const SEND: &[u8; 4] = b"SEND";
pub const RECV: &[u8; 4] = b"RECV";
pub const OKAY: &[u8; 4] = b"OKAY";
pub const FAIL: &[u8; 4] = b"FAIL";

/// Largest `DATA` chunk, in both directions
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Longest path accepted in a request
pub const MAX_PATH_LEN: usize = 1024;

/// Reads and writes sync frames on a borrowed connection
pub struct SyncTransport<'a, S> {
    stream: &'a mut S,
}

impl<'a, S> SyncTransport<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: &'a mut S) -> Self {
        Self { stream }
    }

    /// Read a frame header: 4-byte id and little-endian length
    pub async fn read_header(&mut self) -> io::Result<([u8; 4], u32)> {
        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header).await?;

        let id = [header[0], header[1], header[2], header[3]];
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        Ok((id, len))
    }

    /// Read the path of a request
    pub async fn read_path(&mut self, len: u32) -> io::Result<String> {
        self.read_text(len, MAX_PATH_LEN).await
    }

    async fn read_text(&mut self, len: u32, limit: usize) -> io::Result<String> {
        let len = len as usize;
        if len > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Sync string too long: {} bytes", len),
            ));
        }

        let mut text = vec![0u8; len];
        self.stream.read_exact(&mut text).await?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// Discard `len` bytes of request payload
    pub async fn skip(&mut self, len: u32) -> io::Result<()> {
        let mut payload = (&mut *self.stream).take(len as u64);
        let skipped = tokio::io::copy(&mut payload, &mut tokio::io::sink()).await?;
        if skipped < len as u64 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }

    /// Collect `DATA` chunks until `DONE`.
    ///
    /// A `FAIL` from the peer aborts the transfer. Any other id means the
    /// stream can no longer be framed and is returned as an I/O error.
    pub async fn read_chunks(&mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::new();

        loop {
            let (id, len) = self.read_header().await?;
            match &id {
                b"DATA" => {
                    let len = len as usize;
                    if len > CHUNK_SIZE {
                        return Err(invalid_data(format!("Sync chunk too large: {} bytes", len)));
                    }
                    let start = buffer.len();
                    buffer.resize(start + len, 0);
                    self.stream.read_exact(&mut buffer[start..]).await?;
                }
                b"DONE" => break,
                b"FAIL" => {
                    let message = self.read_text(len, CHUNK_SIZE).await?;
                    return Err(SyncError::Aborted(message).into());
                }
                _ => {
                    return Err(invalid_data(format!(
                        "Unexpected sync chunk id {:?}",
                        String::from_utf8_lossy(&id)
                    )));
                }
            }
        }

        debug!("Received {} bytes in sync chunks", buffer.len());
        Ok(buffer.freeze())
    }

    /// Send `data` as `DATA` chunks of at most [`CHUNK_SIZE`] bytes
    pub async fn send_stream(&mut self, data: &[u8]) -> io::Result<()> {
        for chunk in data.chunks(CHUNK_SIZE) {
            self.send_data_chunk(chunk).await?;
        }
        Ok(())
    }

    async fn send_data_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(DATA).await?;
        self.stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
        self.stream.write_all(data).await
    }

    /// Send a status frame with a 4-byte value, e.g. `OKAY` or `DONE`
    pub async fn send_status(&mut self, id: &[u8; 4], value: u32) -> io::Result<()> {
        self.stream.write_all(id).await?;
        self.stream.write_all(&value.to_le_bytes()).await?;
        self.stream.flush().await
    }

    /// Send `FAIL` with a length-prefixed message
    pub async fn send_fail(&mut self, message: &str) -> io::Result<()> {
        self.stream.write_all(FAIL).await?;
        self.stream.write_all(&(message.len() as u32).to_le_bytes()).await?;
        self.stream.write_all(message.as_bytes()).await?;
        self.stream.flush().await
    }
}

/// Split a `SEND` target of the form `path[,mode]`.
///
/// The mode is decimal. A comma at position 0 is part of the path.
pub fn parse_send_target(target: &str) -> std::result::Result<(RemoteFile, u32), SyncError> {
    match target.rfind(',') {
        Some(idx) if idx > 0 => {
            let mode = &target[idx + 1..];
            let mode = mode
                .parse::<u32>()
                .map_err(|_| SyncError::InvalidMode(mode.to_string()))?;
            Ok((RemoteFile::new(&target[..idx]), mode))
        }
        _ => Ok((RemoteFile::new(target), DEFAULT_FILE_MODE)),
    }
}

fn invalid_data(message: String) -> AdbError {
    io::Error::new(io::ErrorKind::InvalidData, message).into()
}
