//! keel: an MVC request pipeline with an axum host.

pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod mvc;
pub mod observability;
pub mod routing;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mvc::{Application, Outcome};
