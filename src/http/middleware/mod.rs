//! Request middleware.
//!
//! # Data Flow
//! ```text
//! MiddlewareRef (route table)
//!     → resolver.rs (callable as-is, or resource name → path)
//!     → loader.rs (load resource → callable or plain value)
//!     → Middleware::handle(ctx) → true (continue) / false (deny, 403)
//! ```
//!
//! # Design Decisions
//! - Closed reference type: in-process function or resource name
//! - Development mode fails loudly on broken references; production
//!   substitutes a pass-through so the site stays up

pub mod loader;
pub mod resolver;

use std::fmt;
use std::sync::Arc;

use crate::http::request::RequestContext;

pub use loader::{FsMiddlewareLoader, Loaded, MemoryMiddlewareLoader, MiddlewareLoader, RuleSet};
pub use resolver::MiddlewareResolver;

/// Decides whether a request may continue.
pub trait Middleware: Send + Sync {
    /// Returns `false` to deny the request.
    fn handle(&self, ctx: &RequestContext<'_>) -> bool;
}

impl<F> Middleware for F
where
    F: Fn(&RequestContext<'_>) -> bool + Send + Sync,
{
    fn handle(&self, ctx: &RequestContext<'_>) -> bool {
        self(ctx)
    }
}

/// Always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Middleware for PassThrough {
    fn handle(&self, _ctx: &RequestContext<'_>) -> bool {
        true
    }
}

/// Middleware as stored on a route.
#[derive(Clone)]
pub enum MiddlewareRef {
    Func(Arc<dyn Middleware>),
    /// Resource name, loaded at dispatch time.
    Resource(String),
}

impl MiddlewareRef {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&RequestContext<'_>) -> bool + Send + Sync + 'static,
    {
        MiddlewareRef::Func(Arc::new(f))
    }

    pub fn resource(name: impl Into<String>) -> Self {
        MiddlewareRef::Resource(name.into())
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        MiddlewareRef::resource(name)
    }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self {
        MiddlewareRef::Resource(name)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(mw: Arc<dyn Middleware>) -> Self {
        MiddlewareRef::Func(mw)
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareRef::Func(_) => f.write_str("MiddlewareRef::Func(..)"),
            MiddlewareRef::Resource(name) => f.debug_tuple("MiddlewareRef::Resource").field(name).finish(),
        }
    }
}
