//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! application host. All types derive Serde traits for deserialization
//! from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, backpressure).
    pub listener: ListenerConfig,

    /// Pipeline defaults and switches.
    pub application: ApplicationConfig,

    /// Template view settings.
    pub view: ViewConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Declared routes, matched in order before the default routes.
    pub routes: Vec<RouteConfig>,

    /// Module descriptors.
    pub modules: Vec<ModuleConfig>,

    /// Target used when no route matches.
    pub not_found: Option<NotFoundConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Pipeline defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Module started when the route names none.
    pub default_module: Option<String>,

    /// Namespace applied when the route names none.
    pub default_namespace: Option<String>,

    pub default_controller: String,

    pub default_action: String,

    /// Render the view automatically after dispatch.
    pub implicit_view: bool,

    /// Forward budget per request before `CyclicRouting`.
    pub max_forwards: u32,

    /// Append `/`, `/:controller` and `/:controller/:action/:params`.
    pub default_routes: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            default_module: None,
            default_namespace: None,
            default_controller: "index".to_string(),
            default_action: "index".to_string(),
            implicit_view: true,
            max_forwards: 256,
            default_routes: true,
        }
    }
}

/// Template view configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Root directory; templates live at `{views_dir}/{controller}/{action}.{extension}`.
    pub views_dir: PathBuf,

    pub extension: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            views_dir: PathBuf::from("views"),
            extension: "html".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "compact".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A declared route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging and `keel-cli routes`.
    #[serde(default)]
    pub name: Option<String>,

    /// Path pattern, e.g. `/blog/{slug}` or `/admin/:controller/:action/:params`.
    pub pattern: String,

    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub controller: Option<String>,

    #[serde(default)]
    pub action: Option<String>,
}

/// A module descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Name routes refer to.
    pub name: String,

    /// Module class; empty or absent means `Module`.
    #[serde(default)]
    pub class_name: Option<String>,

    /// Source file that must exist before the class is used.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Not-found target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotFoundConfig {
    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    pub controller: String,

    pub action: String,
}
