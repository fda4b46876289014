//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline and HTTP host produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (compact or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP span (see `http::request`)
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
