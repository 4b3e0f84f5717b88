//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format:
//! ```text
//! ┌──────────┬──────────┐
//! │ Id       │ Length   │
//! │ 4 bytes  │ 4 bytes  │
//! │ uint32 BE│ uint32 BE│
//! └──────────┴──────────┘
//! ```
//!
//! Both fields are Big Endian. The same layout is used in both directions
//! and both execution modes: parent→child frames are requests (id != 0),
//! child→parent frames are responses (id != 0, echoing the request id) or
//! events (id == 0).

use bytes::Bytes;

use crate::error::{ForkwireError, Result};
use crate::protocol::Frame;

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Id reserved for events (child → parent, uncorrelated).
pub const EVENT_ID: u32 = 0;

/// Default maximum payload size: the full range the length field allows.
pub const DEFAULT_MAX_PAYLOAD: u32 = u32::MAX;

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Request id; 0 means event.
    pub id: u32,
    /// Payload length in bytes.
    pub length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(id: u32, length: u32) -> Self {
        Self { id, length }
    }

    /// Encode header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            length: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Check if this frame is an event (id == 0).
    #[inline]
    pub fn is_event(&self) -> bool {
        self.id == EVENT_ID
    }
}

/// Encode a request frame.
///
/// `id` must be non-zero; 0 is reserved for events.
pub fn encode_request(id: u32, payload: &[u8]) -> Result<Vec<u8>> {
    if id == EVENT_ID {
        return Err(ForkwireError::Protocol(
            "request id 0 is reserved for events".to_string(),
        ));
    }
    Ok(encode_frame(id, payload))
}

/// Encode a response frame. The id must echo the request it answers.
pub fn encode_response(id: u32, payload: &[u8]) -> Result<Vec<u8>> {
    if id == EVENT_ID {
        return Err(ForkwireError::Protocol(
            "response id 0 is reserved for events".to_string(),
        ));
    }
    Ok(encode_frame(id, payload))
}

/// Encode an event frame (id 0).
pub fn encode_event(payload: &[u8]) -> Vec<u8> {
    encode_frame(EVENT_ID, payload)
}

fn encode_frame(id: u32, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(id, payload.len() as u32);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

/// Decode one frame from the front of `buf`.
///
/// A pure function of the buffer prefix:
/// - `Ok(Some((consumed, frame)))` when a complete frame is available,
/// - `Ok(None)` when fewer than `HEADER_SIZE + length` bytes are buffered,
/// - `Err(..)` when the declared length exceeds `max_payload`.
pub fn decode(buf: &[u8], max_payload: u32) -> Result<Option<(usize, Frame)>> {
    let header = match Header::decode(buf) {
        Some(h) => h,
        None => return Ok(None),
    };

    if header.length > max_payload {
        return Err(ForkwireError::Frame(format!(
            "declared payload length {} exceeds maximum {}",
            header.length, max_payload
        )));
    }

    let total = HEADER_SIZE + header.length as usize;
    if buf.len() < total {
        return Ok(None);
    }

    let payload = Bytes::copy_from_slice(&buf[HEADER_SIZE..total]);
    Ok(Some((total, Frame::new(header, payload))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(42, 100);
        let encoded = original.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = Header::new(0x01020304, 0x05060708);
        let bytes = header.encode();

        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x02);
        assert_eq!(bytes[2], 0x03);
        assert_eq!(bytes[3], 0x04);
        assert_eq!(bytes[4], 0x05);
        assert_eq!(bytes[5], 0x06);
        assert_eq!(bytes[6], 0x07);
        assert_eq!(bytes[7], 0x08);
    }

    #[test]
    fn test_header_size_is_exactly_8() {
        assert_eq!(HEADER_SIZE, 8);
        let header = Header::new(1, 0);
        assert_eq!(header.encode().len(), 8);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 7]; // One byte short
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn test_encode_request_rejects_id_zero() {
        assert!(encode_request(0, b"data").is_err());
        assert!(encode_response(0, b"data").is_err());
    }

    #[test]
    fn test_frame_roundtrip() {
        let bytes = encode_request(7, b"hello").unwrap();
        let (consumed, frame) = decode(&bytes, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(frame.header.id, 7);
        assert_eq!(&frame.payload[..], b"hello");
    }

    #[test]
    fn test_event_roundtrip() {
        let bytes = encode_event(b"progress");
        let (_, frame) = decode(&bytes, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();

        assert!(frame.header.is_event());
        assert_eq!(&frame.payload[..], b"progress");
    }

    #[test]
    fn test_empty_payload_is_legal() {
        let bytes = encode_response(3, b"").unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let (consumed, frame) = decode(&bytes, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(consumed, HEADER_SIZE);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_decode_need_more() {
        let bytes = encode_request(1, b"partial").unwrap();

        // Every strict prefix decodes to NeedMore.
        for cut in 0..bytes.len() {
            assert!(decode(&bytes[..cut], DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        }
    }

    #[test]
    fn test_decode_respects_max_payload() {
        let header = Header::new(1, 1000);
        let result = decode(&header.encode(), 100);
        assert!(matches!(result, Err(ForkwireError::Frame(_))));
    }

    #[test]
    fn test_decode_leaves_residue_untouched() {
        let mut bytes = encode_request(1, b"first").unwrap();
        bytes.extend_from_slice(&encode_request(2, b"second").unwrap());

        let (consumed, frame) = decode(&bytes, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.header.id, 1);

        let (consumed2, frame2) = decode(&bytes[consumed..], DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame2.header.id, 2);
        assert_eq!(consumed + consumed2, bytes.len());
    }
}
