//! Handler registry.
//!
//! The child's handler is chosen by name from a table populated before
//! the engine starts; the parent's `init` pass-through conventionally
//! carries the chosen name. Blocking and cooperative handlers live in
//! separate tables because their signatures differ.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::child::{blocking, cooperative};
use crate::error::{ForkwireError, Result};
use crate::serializer::Args;

/// Boxed future for cooperative handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered blocking handler: the return tuple becomes the response.
pub type BlockingHandler =
    Arc<dyn Fn(&blocking::Emitter<'_>, Args) -> Result<Args> + Send + Sync>;

/// A registered cooperative handler: completion is signaled through the
/// [`cooperative::Done`] capability.
pub type CooperativeHandler =
    Arc<dyn Fn(cooperative::Done, cooperative::Emitter, Args) -> BoxFuture<'static, ()> + Send + Sync>;

/// Registry mapping handler names to functions.
#[derive(Default)]
pub struct HandlerRegistry {
    blocking: HashMap<String, BlockingHandler>,
    cooperative: HashMap<String, CooperativeHandler>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blocking handler under `name`.
    pub fn register_blocking<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&blocking::Emitter<'_>, Args) -> Result<Args> + Send + Sync + 'static,
    {
        self.blocking.insert(name.to_string(), Arc::new(handler));
    }

    /// Register a cooperative handler under `name`.
    pub fn register_cooperative<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(cooperative::Done, cooperative::Emitter, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cooperative.insert(
            name.to_string(),
            Arc::new(move |done, emitter, args| Box::pin(handler(done, emitter, args))),
        );
    }

    /// Look up a blocking handler by name.
    pub fn blocking(&self, name: &str) -> Result<BlockingHandler> {
        self.blocking
            .get(name)
            .cloned()
            .ok_or_else(|| ForkwireError::HandlerNotFound(name.to_string()))
    }

    /// Look up a cooperative handler by name.
    pub fn cooperative(&self, name: &str) -> Result<CooperativeHandler> {
        self.cooperative
            .get(name)
            .cloned()
            .ok_or_else(|| ForkwireError::HandlerNotFound(name.to_string()))
    }

    /// Names of all registered blocking handlers.
    pub fn blocking_names(&self) -> impl Iterator<Item = &str> {
        self.blocking.keys().map(String::as_str)
    }

    /// Names of all registered cooperative handlers.
    pub fn cooperative_names(&self) -> impl Iterator<Item = &str> {
        self.cooperative.keys().map(String::as_str)
    }
}
