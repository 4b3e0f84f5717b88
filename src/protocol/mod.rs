//! Protocol layer: wire format, frames, and the rolling read buffer.

mod frame;
mod frame_buffer;
pub mod wire;

pub use frame::Frame;
pub use frame_buffer::{FrameBuffer, READ_BUF_INIT, READ_HEADROOM};
pub use wire::{
    decode, encode_event, encode_request, encode_response, Header, DEFAULT_MAX_PAYLOAD, EVENT_ID,
    HEADER_SIZE,
};
