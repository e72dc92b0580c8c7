//! Minimal HTTP request router.
//!
//! Routes are registered once through a builder (with groups, prefixes and
//! middleware), then a dispatcher matches each request against the finished
//! table, runs middleware and the CSRF check, and invokes the handler.

pub mod config;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::{AppConfig, Mode};
pub use http::{Dispatcher, HandlerRef, HttpServer, MiddlewareRef, Reply, RequestContext};
pub use lifecycle::Shutdown;
pub use routing::{GroupAttributes, RouteError, RouteTable, Routes};
pub use security::{CsrfGuard, Session};
