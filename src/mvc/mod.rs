//! MVC request pipeline.
//!
//! # Data Flow
//! ```text
//! Application::handle(uri)
//!     → boot event
//!     → Router::handle (match callback may answer directly)
//!     → ModuleRegistry::start (module services into the request Di)
//!     → ViewScope::start
//!     → Dispatcher::dispatch (forward loop, bounded)
//!     → implicit view render
//!     → Response: headers + cookies sent once
//! ```
//!
//! # Design Decisions
//! - Every collaborator is request-scoped except configuration
//! - Subscribers can abort or replace the response at each checkpoint
//! - Errors are typed per stage and surface unchanged through `AppError`

pub mod application;
pub mod di;
pub mod dispatcher;
pub mod error;
pub mod module;
pub mod view;

pub use application::{Application, Outcome};
pub use di::Di;
pub use dispatcher::{
    bind, camelize, ActionContext, ActionHandle, ActionResult, Controller, Dispatcher, Forward,
    Returned, ViewVars,
};
pub use error::{AppError, AppResult, ConfigurationError, DispatchError, ReloadError, ViewError};
pub use module::{FileModuleLoader, ModuleDefinition, ModuleDescriptor, ModuleLoader, ModuleRegistry};
pub use view::{OutputBuffer, TemplateView, View, ViewScope};
