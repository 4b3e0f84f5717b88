//! MessagePack serializer using `rmp-serde`.
//!
//! The structured-binary choice: values travel as a MessagePack array of
//! bin elements, 8-bit clean and platform-independent. `serde_bytes`
//! wrappers make rmp emit real bin payloads instead of integer arrays.

use bytes::Bytes;
use serde_bytes::ByteBuf;

use super::{Args, Serializer};
use crate::error::Result;

/// MessagePack serializer for structured binary payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPack;

impl Serializer for MsgPack {
    fn encode(&self, values: &[Bytes]) -> Result<Vec<u8>> {
        let wrapped: Vec<ByteBuf> = values.iter().map(|v| ByteBuf::from(v.to_vec())).collect();
        Ok(rmp_serde::to_vec(&wrapped)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Args> {
        let wrapped: Vec<ByteBuf> = rmp_serde::from_slice(bytes)?;
        Ok(wrapped
            .into_iter()
            .map(|b| Bytes::from(b.into_vec()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::args;

    #[test]
    fn test_round_trip() {
        let values = args([&b"hello"[..], &b""[..], &b"\x00\x01\x02"[..]]);
        let encoded = MsgPack.encode(&values).unwrap();
        let decoded = MsgPack.decode(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_eight_bit_clean() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let values = args([all_bytes]);
        let encoded = MsgPack.encode(&values).unwrap();
        assert_eq!(MsgPack.decode(&encoded).unwrap(), values);
    }

    #[test]
    fn test_empty_tuple() {
        let encoded = MsgPack.encode(&[]).unwrap();
        assert!(MsgPack.decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(MsgPack.decode(&[0xc1]).is_err());
    }
}
