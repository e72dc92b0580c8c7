//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Routes::get/post/... and Routes::group
//!     → router.rs (append, apply group prefix + middleware)
//!     → Routes::build()
//!     → Freeze as immutable RouteTable
//!
//! Incoming request (method, path):
//!     → router.rs (scan table in registration order)
//!     → matcher.rs (segment-by-segment match, bind params)
//!     → Return: matched Route + Params, or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{split_path, Params, PathPattern, Segment};
pub use router::{GroupAttributes, Route, RouteError, RouteHandle, RouteMethod, RouteTable, Routes};
