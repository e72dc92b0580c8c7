//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and HTTP layers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the trace layer into every log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
