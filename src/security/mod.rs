//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → session.rs (session handle from the cookie id)
//!     → csrf.rs (token check on state-changing methods)
//!     → handler
//!     → csrf.rs (rotate token after a successful state change)
//!     → headers.rs (hardening headers on the response)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a bad or missing token on a checked request is a 403
//! - Token comparison is constant time
//! - No ambient session state; the handle is passed explicitly

pub mod csrf;
pub mod headers;
pub mod session;

pub use csrf::CsrfGuard;
pub use session::{MemorySessionStore, Session, SessionStore};
