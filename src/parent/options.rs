//! Options for spawning the parent engine.

use std::sync::Arc;

use bytes::Bytes;

use crate::protocol::DEFAULT_MAX_PAYLOAD;
use crate::serializer::{Args, LengthPrefixed, Serializer};

/// Child execution model the peer is running. Must match the engine
/// started in the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Serial child: one request in flight, responses in request order.
    Blocking,
    /// Concurrent child: pipelined requests, responses in completion order.
    Cooperative,
}

pub(crate) type EventFn = Box<dyn FnMut(Args) + Send>;
pub(crate) type ErrorFn = Box<dyn FnOnce(String) + Send>;
pub(crate) type DestroyFn = Box<dyn FnOnce() + Send>;

/// Configuration for [`crate::parent::spawn`].
///
/// Built fluently:
///
/// ```ignore
/// let options = Options::new(Mode::Cooperative)
///     .on_event(|values| println!("event: {:?}", values))
///     .on_error(|msg| eprintln!("rpc failed: {}", msg))
///     .on_destroy(|| println!("child done"));
/// let handle = forkwire::parent::spawn(stream, options);
/// ```
pub struct Options {
    pub(crate) mode: Mode,
    pub(crate) serializer: Arc<dyn Serializer>,
    pub(crate) on_event: Option<EventFn>,
    pub(crate) on_error: Option<ErrorFn>,
    pub(crate) on_destroy: Option<DestroyFn>,
    pub(crate) init: Option<Bytes>,
    pub(crate) max_payload: u32,
}

impl Options {
    /// Create options for the given peer mode, with the default
    /// [`LengthPrefixed`] serializer.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            serializer: Arc::new(LengthPrefixed),
            on_event: None,
            on_error: None,
            on_destroy: None,
            init: None,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Replace the serializer. Both endpoints must agree.
    pub fn serializer<S: Serializer>(mut self, serializer: S) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    /// Callback for every event frame the child emits.
    pub fn on_event<F: FnMut(Args) + Send + 'static>(mut self, f: F) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    /// Callback for the single fatal error, if any. After it fires the
    /// engine is closed and pending replies are dropped.
    ///
    /// If absent, a fatal error is surfaced as an `("error", msg)` event
    /// when `on_event` is set, and logged at error level otherwise.
    pub fn on_error<F: FnOnce(String) + Send + 'static>(mut self, f: F) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Callback for clean shutdown: every handle released, all replies
    /// delivered, EOF seen. Mutually exclusive with `on_error`.
    pub fn on_destroy<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_destroy = Some(Box::new(f));
        self
    }

    /// Opaque pass-through for the external process-spawning layer (for
    /// example the name of the registered child handler). The engine
    /// never reads it.
    pub fn init<B: Into<Bytes>>(mut self, data: B) -> Self {
        self.init = Some(data.into());
        self
    }

    /// Cap the accepted payload length per frame. Oversized declared
    /// lengths are a fatal framing error.
    pub fn max_payload(mut self, max: u32) -> Self {
        self.max_payload = max;
        self
    }

    /// The `init` pass-through, for the spawning layer to consume.
    pub fn init_data(&self) -> Option<&Bytes> {
        self.init.as_ref()
    }

    /// The configured peer mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::new(Mode::Blocking);
        assert_eq!(options.mode(), Mode::Blocking);
        assert_eq!(options.max_payload, DEFAULT_MAX_PAYLOAD);
        assert!(options.on_event.is_none());
        assert!(options.on_error.is_none());
        assert!(options.on_destroy.is_none());
        assert!(options.init_data().is_none());
    }

    #[test]
    fn test_fluent_chain() {
        let options = Options::new(Mode::Cooperative)
            .on_event(|_| {})
            .on_error(|_| {})
            .on_destroy(|| {})
            .init("echo")
            .max_payload(1024);

        assert_eq!(options.mode(), Mode::Cooperative);
        assert_eq!(options.max_payload, 1024);
        assert!(options.on_event.is_some());
        assert!(options.on_error.is_some());
        assert!(options.on_destroy.is_some());
        assert_eq!(options.init_data().unwrap().as_ref(), b"echo");
    }
}
