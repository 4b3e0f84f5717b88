//! Rolling read buffer for accumulating partial reads.
//!
//! Both engines read into the tail of a single `bytes::BytesMut` and pop
//! complete frames off the front. The buffer starts at 512 bytes and grows
//! geometrically (doubled plus a small constant) whenever the remaining
//! headroom falls below [`READ_HEADROOM`], so a single read syscall can
//! always make meaningful progress.

use bytes::BytesMut;

use super::wire::{Header, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use super::Frame;
use crate::error::{ForkwireError, Result};

/// Initial buffer capacity.
pub const READ_BUF_INIT: usize = 512;

/// Minimum spare capacity kept ahead of the unparsed bytes.
pub const READ_HEADROOM: usize = 128;

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buf: BytesMut,
    /// Maximum allowed payload size.
    max_payload: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a new frame buffer with a custom max payload size.
    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buf: BytesMut::with_capacity(READ_BUF_INIT),
            max_payload,
        }
    }

    /// Grow the buffer if the spare capacity has fallen below the headroom
    /// threshold, then hand out the underlying `BytesMut` so a nonblocking
    /// read (`try_read_buf`) can append into the tail.
    pub fn tail(&mut self) -> &mut BytesMut {
        self.ensure_headroom();
        &mut self.buf
    }

    /// Issue one blocking read into the tail of the buffer.
    ///
    /// Returns the number of bytes read; 0 means EOF.
    pub fn read_from<R: std::io::Read>(&mut self, reader: &mut R) -> std::io::Result<usize> {
        self.ensure_headroom();
        let start = self.buf.len();
        let cap = self.buf.capacity();
        self.buf.resize(cap, 0);
        let result = reader.read(&mut self.buf[start..]);
        match result {
            Ok(n) => {
                self.buf.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                self.buf.truncate(start);
                Err(e)
            }
        }
    }

    /// Try to extract a single complete frame off the front of the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted,
    /// - `Ok(None)` if more data is needed,
    /// - `Err(..)` if the declared length exceeds the max payload.
    ///
    /// The payload is detached zero-copy via `split_to(..).freeze()`.
    pub fn extract(&mut self) -> Result<Option<Frame>> {
        let header = match Header::decode(&self.buf) {
            Some(h) => h,
            None => return Ok(None),
        };

        if header.length > self.max_payload {
            return Err(ForkwireError::Frame(format!(
                "declared payload length {} exceeds maximum {}",
                header.length, self.max_payload
            )));
        }

        let total = HEADER_SIZE + header.length as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        let _ = self.buf.split_to(HEADER_SIZE);
        let payload = self.buf.split_to(header.length as usize).freeze();
        Ok(Some(Frame::new(header, payload)))
    }

    /// Append raw bytes (test and blocking-path helper).
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered, not yet extracted bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer holds no unparsed bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    fn ensure_headroom(&mut self) {
        let cap = self.buf.capacity();
        if cap - self.buf.len() < READ_HEADROOM {
            // At least double, plus a constant so a zero-capacity buffer
            // still grows.
            self.buf.reserve(cap + 16);
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
