//! Method-name routing for inbound requests.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use wirerpc_channel::DispatchTable;
//!
//! let mut table = DispatchTable::new();
//! table.register_fn("echo", |body: Bytes| Ok::<_, std::convert::Infallible>(body));
//! table.register("greet", |ctx, _body| {
//!     ctx.send_response(Bytes::from_static(b"hello"))?;
//!     Ok(())
//! });
//! assert!(table.contains("echo"));
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::RequestContext;

/// Failure reported by a handler; its `Display` text becomes the error
/// reply.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler functions.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Serves one method.
///
/// The handler answers through `ctx`. If it returns `Err` before answering,
/// the channel answers with the error's text.
///
/// Handlers run on the thread driving the connection. A handler must not
/// block on a [`Caller::call`](crate::Caller::call) over the same
/// connection: the reply can only be read by the thread it is blocking.
/// Use [`Caller::send`](crate::Caller::send) with a completion instead.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &mut RequestContext<'_>, request: Bytes) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext<'_>, Bytes) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut RequestContext<'_>, request: Bytes) -> HandlerResult {
        self(ctx, request)
    }
}

/// Adapts a plain `request -> response` function into a [`Handler`].
struct ReplyWith<F>(F);

impl<F, E> Handler for ReplyWith<F>
where
    F: Fn(Bytes) -> std::result::Result<Bytes, E> + Send + Sync + 'static,
    E: Display,
{
    fn call(&self, ctx: &mut RequestContext<'_>, request: Bytes) -> HandlerResult {
        match (self.0)(request) {
            Ok(body) => ctx.send_response(body)?,
            Err(err) => ctx.send_error(err.to_string())?,
        }
        Ok(())
    }
}

/// Method name to handler mapping.
///
/// Names match exactly and case-sensitively. Cloning is cheap: handlers are
/// shared, so one table can serve many connections.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure that answers through its [`RequestContext`].
    ///
    /// Replaces any handler already registered under `method`.
    pub fn register<F>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut RequestContext<'_>, Bytes) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(method, handler)
    }

    /// Register a function whose return value is the reply.
    pub fn register_fn<F, E>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Bytes) -> std::result::Result<Bytes, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        self.register_handler(method, ReplyWith(handler))
    }

    /// Register any [`Handler`] implementation.
    pub fn register_handler<H: Handler>(&mut self, method: impl Into<String>, handler: H) -> &mut Self {
        let method = method.into();
        if self.handlers.insert(method.clone(), Arc::new(handler)).is_some() {
            tracing::debug!(method, "replaced handler");
        }
        self
    }

    /// Handler registered for `method`.
    pub fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("methods", &self.methods())
            .finish()
    }
}
