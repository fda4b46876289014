//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build the application: routes, modules, base DI container
//! - Resolve relative paths against the config file's directory
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Without a config file every default applies and paths are relative to
//!   the working directory

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{load_config, AppConfig, ConfigError, ViewConfig};
use crate::mvc::{Application, Di, TemplateView};
use crate::routing::PatternError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("routes: {0}")]
    Routes(#[from] PatternError),
}

/// Load the config at `path`, or defaults when `None`.
///
/// Returns the config and the directory relative paths resolve against.
/// Runs before logging is initialized, so it does not log; see [`report_config`].
pub fn load(path: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>), StartupError> {
    match path {
        Some(path) => {
            let config = load_config(path)?;
            let base = path.parent().map(Path::to_path_buf);
            Ok((config, base))
        }
        None => Ok((AppConfig::default(), None)),
    }
}

/// Log where the configuration came from. Call once logging is up.
pub fn report_config(config: &AppConfig, path: Option<&Path>) {
    match path {
        Some(path) => tracing::info!(
            path = ?path,
            routes = config.routes.len(),
            modules = config.modules.len(),
            "Configuration loaded"
        ),
        None => tracing::info!("No configuration file, using defaults"),
    }
}

/// Base container: a template view rooted at the configured views directory.
pub fn base_di(view: &ViewConfig, base_dir: Option<&Path>) -> Di {
    let mut view = view.clone();
    if let Some(base) = base_dir {
        if view.views_dir.is_relative() {
            view.views_dir = base.join(&view.views_dir);
        }
    }

    let mut di = Di::new();
    di.set_view(move || Box::new(TemplateView::from_config(&view)));
    di
}

/// Build the application with its base container attached.
pub fn build_application(
    config: &AppConfig,
    base_dir: Option<PathBuf>,
) -> Result<Application, StartupError> {
    let di = base_di(&config.view, base_dir.as_deref());
    let mut application = Application::from_config(config, base_dir)?;
    application.set_di(di);

    tracing::info!(
        routes = application.routes().len(),
        modules = application.modules().len(),
        implicit_view = config.application.implicit_view,
        "Application built"
    );
    Ok(application)
}
