//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, layers, session cookie, form decoding)
//!     → dispatcher.rs (route match, middleware, CSRF, handler)
//!         → middleware/ (resolve and run middleware)
//!         → handler.rs (function or resource handler)
//!         → views.rs (error pages)
//!     → response.rs (Reply → axum Response)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod views;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use handler::{Handler, HandlerError, HandlerRef, HandlerResult};
pub use middleware::{Middleware, MiddlewareRef};
pub use request::{FormData, IncomingRequest, RequestContext};
pub use response::Reply;
pub use server::HttpServer;
