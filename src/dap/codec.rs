//! Content-Length framing shared by the DAP transport and the stdio tool server.
//!
//! `feed` accumulates bytes across calls and yields every complete frame in
//! the buffer. A body that is not valid JSON is reported for that one frame
//! and skipped. A malformed header halts the codec: the buffer is dropped and
//! nothing more is decoded until [`FrameCodec::reset`].

use std::marker::PhantomData;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{trace, warn};

use crate::{Error, Result};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &str = "content-length";

/// Longest header section accepted before the stream is declared malformed.
pub const MAX_HEADER_LEN: usize = 1024;

/// Largest body a header may announce.
pub const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

pub struct FrameCodec<T> {
    buffer: BytesMut,
    halted: bool,
    _message: PhantomData<fn() -> T>,
}

impl<T> Default for FrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameCodec<T> {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            halted: false,
            _message: PhantomData,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer and resume decoding after a fatal header error.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.halted = false;
    }
}

impl<T: Serialize> FrameCodec<T> {
    pub fn encode(message: &T) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        let mut frame = Vec::with_capacity(header.len() + body.len());
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

impl<T: DeserializeOwned> FrameCodec<T> {
    /// Push bytes and decode every frame that is now complete.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<T>> {
        if self.halted {
            trace!("Codec halted, dropping {} bytes", data.len());
            return Vec::new();
        }

        self.buffer.extend_from_slice(data);

        let mut decoded = Vec::new();
        loop {
            match self.try_extract_one() {
                Ok(Some(frame)) => decoded.push(frame),
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Malformed frame header, discarding {} buffered bytes",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    self.halted = true;
                    decoded.push(Err(e));
                    break;
                }
            }
        }
        decoded
    }

    /// `Ok(None)` means more bytes are needed; `Err` is a fatal header error.
    fn try_extract_one(&mut self) -> Result<Option<Result<T>>> {
        let header_end = match find_terminator(&self.buffer) {
            Some(pos) if pos > MAX_HEADER_LEN => {
                return Err(Error::fatal_decode(format!(
                    "Header section exceeds {} bytes",
                    MAX_HEADER_LEN
                )));
            }
            Some(pos) => pos,
            None if self.buffer.len() >= MAX_HEADER_LEN + HEADER_TERMINATOR.len() => {
                return Err(Error::fatal_decode(format!(
                    "No header terminator within {} bytes",
                    MAX_HEADER_LEN
                )));
            }
            None => return Ok(None),
        };

        let content_length = parse_content_length(&self.buffer[..header_end])?;
        let body_start = header_end + HEADER_TERMINATOR.len();
        let frame_end = body_start.checked_add(content_length).ok_or_else(|| {
            Error::fatal_decode(format!("Content-Length {} overflows", content_length))
        })?;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let _ = self.buffer.split_to(body_start);
        let body = self.buffer.split_to(content_length).freeze();
        trace!("Decoded frame of {} bytes", content_length);

        Ok(Some(serde_json::from_slice(&body).map_err(|e| {
            Error::decode(format!("Frame body is not valid JSON: {}", e))
        })))
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

fn parse_content_length(header: &[u8]) -> Result<usize> {
    let header = std::str::from_utf8(header)
        .map_err(|e| Error::fatal_decode(format!("Header is not UTF-8: {}", e)))?;

    let value = header
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(CONTENT_LENGTH))
        .map(|(_, value)| value.trim())
        .ok_or_else(|| Error::fatal_decode("Missing Content-Length header"))?;

    let length = value
        .parse::<usize>()
        .map_err(|_| Error::fatal_decode(format!("Invalid Content-Length value '{}'", value)))?;
    if length > MAX_BODY_LEN {
        return Err(Error::fatal_decode(format!(
            "Content-Length {} exceeds the {} byte limit",
            length, MAX_BODY_LEN
        )));
    }
    Ok(length)
}
