//! # forkwire
//!
//! A framed, pipelined request/response layer between a parent process
//! and a previously forked child sharing one bidirectional byte-stream
//! (typically a connected socketpair inherited across the fork), with an
//! out-of-band event channel.
//!
//! ## Architecture
//!
//! - **Wire**: every frame is `u32 id | u32 length | payload`, big
//!   endian. Non-zero ids correlate requests with responses; id 0 marks
//!   an event flowing child → parent, never correlated to a request.
//! - **Parent** ([`parent`]): a nonblocking dispatcher owning the
//!   socket, the pending-reply table, and the drain-and-close shutdown
//!   state machine. [`parent::spawn`] returns a cloneable [`Handle`];
//!   dropping the last clone starts a graceful shutdown.
//! - **Child** ([`child`]): two interchangeable engines. The
//!   [`child::blocking`] engine is a serial loop over synchronous
//!   syscalls; the [`child::cooperative`] engine pipelines requests
//!   through spawned handlers completing via an explicit done
//!   capability.
//! - **Serializers** ([`serializer`]): a pure encode/decode pair shared
//!   by both ends, chosen per deployment.
//!
//! ## Example
//!
//! ```ignore
//! use forkwire::{args, parent, Mode, Options};
//!
//! // Parent end of the inherited socketpair.
//! let handle = parent::spawn(stream, Options::new(Mode::Blocking)
//!     .on_event(|values| println!("event: {:?}", values))
//!     .on_destroy(|| println!("child finished")));
//!
//! handle.invoke(args(["hello"]), |reply| {
//!     println!("child said: {:?}", reply);
//! });
//! ```
//!
//! Process creation and fd inheritance are the caller's business: both
//! engines take an already-connected stream.

pub mod child;
pub mod error;
pub mod parent;
pub mod protocol;
pub mod registry;
pub mod serializer;

pub use error::{ForkwireError, Result};
pub use parent::{Handle, Mode, Options};
pub use registry::HandlerRegistry;
pub use serializer::{args, Args, JsonArray, LengthPrefixed, MsgPack, Serializer};
