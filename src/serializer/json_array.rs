//! JSON array serializer.
//!
//! The payload is a UTF-8 JSON array whose elements are the argument
//! values. Readable on the wire and trivially consumed by non-Rust peers,
//! but restricted to UTF-8 values: a non-UTF-8 byte string is a
//! serializer failure, which is fatal for the connection.

use bytes::Bytes;

use super::{Args, Serializer};
use crate::error::{ForkwireError, Result};

/// JSON array-of-strings serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonArray;

impl Serializer for JsonArray {
    fn encode(&self, values: &[Bytes]) -> Result<Vec<u8>> {
        let strings = values
            .iter()
            .map(|v| {
                std::str::from_utf8(v).map_err(|e| {
                    ForkwireError::Codec(format!("non-UTF-8 value in JSON array: {}", e))
                })
            })
            .collect::<Result<Vec<&str>>>()?;
        Ok(serde_json::to_vec(&strings)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Args> {
        let strings: Vec<String> = serde_json::from_slice(bytes)?;
        Ok(strings
            .into_iter()
            .map(|s| Bytes::from(s.into_bytes()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::args;

    #[test]
    fn test_round_trip() {
        let values = args(["hello".as_bytes().to_vec(), "wörld".as_bytes().to_vec()]);
        let encoded = JsonArray.encode(&values).unwrap();
        let decoded = JsonArray.decode(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_wire_shape_is_json() {
        let values = args([&b"a"[..], b"b"]);
        let encoded = JsonArray.encode(&values).unwrap();
        assert_eq!(&encoded, br#"["a","b"]"#);
    }

    #[test]
    fn test_empty_tuple() {
        let encoded = JsonArray.encode(&[]).unwrap();
        assert_eq!(&encoded, b"[]");
        assert!(JsonArray.decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_non_utf8_rejected() {
        let values = args([vec![0xff, 0xfe]]);
        assert!(matches!(
            JsonArray.encode(&values),
            Err(ForkwireError::Codec(_))
        ));
    }

    #[test]
    fn test_non_string_element_rejected() {
        assert!(JsonArray.decode(br#"[1, 2]"#).is_err());
        assert!(JsonArray.decode(br#"{"a": 1}"#).is_err());
    }
}
