//! Pluggable payload serializers.
//!
//! A serializer is a pair of pure functions mapping between an argument
//! tuple and the frame payload bytes. It is shared by both endpoints and
//! must match on both sides of the socket. Errors during encode or decode
//! are fatal for the connection.
//!
//! Argument tuples are flattened lists of 8-bit-clean byte strings.
//!
//! Standard choices:
//! - [`LengthPrefixed`] - varint-length-prefixed byte strings (default)
//! - [`JsonArray`] - a UTF-8 JSON array of strings
//! - [`MsgPack`] - MessagePack via `rmp-serde`, for structured payloads

mod json_array;
mod length_prefixed;
mod msgpack;

use bytes::Bytes;

use crate::error::Result;

pub use json_array::JsonArray;
pub use length_prefixed::LengthPrefixed;
pub use msgpack::MsgPack;

/// A flattened argument tuple.
pub type Args = Vec<Bytes>;

/// Encode/decode pair applied to every frame payload.
///
/// Implementations must be pure: no state may leak between calls, and
/// `decode(encode(values))` must reproduce `values` exactly.
pub trait Serializer: Send + Sync + 'static {
    /// Encode an argument tuple into payload bytes.
    fn encode(&self, values: &[Bytes]) -> Result<Vec<u8>>;

    /// Decode payload bytes back into an argument tuple.
    fn decode(&self, bytes: &[u8]) -> Result<Args>;
}

/// Convenience for building an argument tuple from anything byte-like.
pub fn args<I, T>(values: I) -> Args
where
    I: IntoIterator<Item = T>,
    T: Into<Bytes>,
{
    values.into_iter().map(Into::into).collect()
}
