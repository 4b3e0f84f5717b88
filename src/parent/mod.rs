//! Parent-side engine: call handle, pending-reply table, and the
//! drain-and-close shutdown state machine.

mod engine;
mod options;
mod pending;

pub use engine::{spawn, Handle};
pub use options::{Mode, Options};
