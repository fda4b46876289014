//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup / reload:
//!     [[routes]] + [application] defaults
//!     → RouteTable::from_config (parse patterns, append default routes)
//!     → Arc<RouteTable>, swapped atomically on reload
//!
//! Per request:
//!     URI
//!     → normalize_uri (strip host, query, fragment)
//!     → Router::handle (first matching pattern wins)
//!     → RouteMatch (module, namespace, controller, action, params, callback)
//! ```
//!
//! # Design Decisions
//! - Patterns are compiled once; matching is segment comparison, no regex
//! - The table is immutable while serving; the router is per request
//! - Deterministic: same table and URI always give the same match

pub mod matcher;
pub mod router;

pub use matcher::{normalize_uri, Captures, Pattern, PatternError};
pub use router::{
    CallbackResult, MatchCallback, Route, RouteDefaults, RouteMatch, RoutePaths, RouteTable,
    Router,
};
