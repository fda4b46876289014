//! Pipeline error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::routing::matcher::PatternError;

/// Fatal setup problems. The request is abandoned and no response is sent.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// `handle` was called before a DI container was attached.
    #[error("A dependency injection container is required to access internal services")]
    MissingContainer,

    /// A service the pipeline needs has no definition in the container.
    #[error("Service '{0}' is not registered in the dependency injection container")]
    MissingService(&'static str),

    /// The resolved module name has no descriptor.
    #[error("Module '{0}' isn't registered in the application container")]
    ModuleNotRegistered(String),

    /// A class descriptor points at a source path that does not exist.
    #[error("Module definition path '{}' doesn't exist", path.display())]
    ModulePathMissing { path: PathBuf },

    /// No definition for the class in the container.
    #[error("Class '{0}' has no definition in the dependency injection container")]
    UnknownClass(String),
}

/// Failures while resolving or running the target action.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{class} handler class cannot be loaded")]
    ControllerNotFound { class: String },

    #[error("Action '{action}' was not found on handler '{controller}'")]
    ActionNotFound { controller: String, action: String },

    #[error("Dispatcher has detected a cyclic routing causing stability problems (limit {limit})")]
    CyclicRouting { limit: u32 },

    /// The action itself failed.
    #[error("Action failed: {0}")]
    Action(String),
}

impl DispatchError {
    /// True when the target could not be resolved (maps to 404 at the host).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::ControllerNotFound { .. } | DispatchError::ActionNotFound { .. }
        )
    }
}

/// View rendering failures.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Failed to read template '{}': {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any error surfaced by `Application::handle`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    View(#[from] ViewError),
}

/// A reloaded route table that cannot replace the running one.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Modules are fixed at startup, so new routes may only target those.
    #[error("{context} targets module '{module}', which is not registered in the running application")]
    UnknownModule { context: String, module: String },
}

/// Result type for pipeline operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigurationError::ModulePathMissing {
            path: PathBuf::from("mod.src"),
        };
        assert_eq!(err.to_string(), "Module definition path 'mod.src' doesn't exist");

        let err = DispatchError::CyclicRouting { limit: 256 };
        assert!(err.to_string().contains("256"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(DispatchError::ControllerNotFound { class: "X".into() }.is_not_found());
        assert!(!DispatchError::Action("boom".into()).is_not_found());

        let app: AppError = ConfigurationError::MissingContainer.into();
        assert!(matches!(app, AppError::Configuration(_)));
    }
}
