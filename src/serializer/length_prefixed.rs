//! Length-prefixed string serializer.
//!
//! The default serializer: each value is written as a base-128 varint
//! length followed by the raw bytes, concatenated. 8-bit clean, no
//! structure beyond the flat tuple.
//!
//! The varint is big-endian base-128: most significant 7-bit group first,
//! continuation bit set on every byte except the last.

use bytes::Bytes;

use super::{Args, Serializer};
use crate::error::{ForkwireError, Result};

/// Length-prefixed byte-string serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthPrefixed;

impl Serializer for LengthPrefixed {
    fn encode(&self, values: &[Bytes]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(values.iter().map(|v| v.len() + 2).sum());
        for value in values {
            encode_varint(value.len() as u64, &mut out);
            out.extend_from_slice(value);
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Args> {
        let mut values = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (consumed, len) = decode_varint(rest)?;
            rest = &rest[consumed..];
            let len = len as usize;
            if rest.len() < len {
                return Err(ForkwireError::Codec(format!(
                    "length prefix {} overruns payload ({} bytes left)",
                    len,
                    rest.len()
                )));
            }
            values.push(Bytes::copy_from_slice(&rest[..len]));
            rest = &rest[len..];
        }
        Ok(values)
    }
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    groups[n] = (value & 0x7f) as u8;
    value >>= 7;
    n += 1;
    while value != 0 {
        groups[n] = 0x80 | (value & 0x7f) as u8;
        value >>= 7;
        n += 1;
    }
    // Emitted most significant group first.
    for i in (0..n).rev() {
        out.push(groups[i]);
    }
}

fn decode_varint(buf: &[u8]) -> Result<(usize, u64)> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= 10 {
            return Err(ForkwireError::Codec("varint too long".to_string()));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((i + 1, value));
        }
    }
    Err(ForkwireError::Codec("truncated varint".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::args;

    #[test]
    fn test_round_trip() {
        let values = args([&b"hello"[..], &b""[..], &b"world"[..]]);
        let encoded = LengthPrefixed.encode(&values).unwrap();
        let decoded = LengthPrefixed.decode(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_empty_tuple() {
        let encoded = LengthPrefixed.encode(&[]).unwrap();
        assert!(encoded.is_empty());
        assert!(LengthPrefixed.decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_eight_bit_clean() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let values = args([all_bytes]);
        let encoded = LengthPrefixed.encode(&values).unwrap();
        assert_eq!(LengthPrefixed.decode(&encoded).unwrap(), values);
    }

    #[test]
    fn test_varint_boundaries() {
        for len in [0usize, 1, 127, 128, 129, 16383, 16384] {
            let values = args([vec![0x55u8; len]]);
            let encoded = LengthPrefixed.encode(&values).unwrap();
            let decoded = LengthPrefixed.decode(&encoded).unwrap();
            assert_eq!(decoded[0].len(), len);
        }
    }

    #[test]
    fn test_varint_wire_shape() {
        let mut out = Vec::new();
        encode_varint(0x7f, &mut out);
        assert_eq!(out, [0x7f]);

        out.clear();
        encode_varint(0x80, &mut out);
        assert_eq!(out, [0x81, 0x00]);

        assert_eq!(decode_varint(&[0x81, 0x00]).unwrap(), (2, 0x80));
    }

    #[test]
    fn test_truncated_prefix_is_error() {
        // Continuation bit set with nothing following.
        assert!(decode_varint(&[0x81]).is_err());

        // Declared length overruns the payload.
        let mut bad = Vec::new();
        encode_varint(10, &mut bad);
        bad.extend_from_slice(b"short");
        assert!(LengthPrefixed.decode(&bad).is_err());
    }
}
