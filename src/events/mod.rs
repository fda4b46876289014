//! Lifecycle events subsystem.
//!
//! # Data Flow
//! ```text
//! Application::handle
//!     → AppEvent (tagged, typed payload)
//!     → EventsManager::fire (subscribers in attachment order)
//!     → EventAction::{Continue, Abort, Override}
//!     → pipeline continues, returns Aborted, or answers with the override
//! ```
//!
//! # Design Decisions
//! - Closed event enum instead of string-keyed dispatch
//! - First non-`Continue` answer stops propagation
//! - Subscribers are `Send + Sync` so the manager is shared across requests

pub mod manager;

pub use manager::{AppEvent, EventAction, EventKind, EventsManager};
