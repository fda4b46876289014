//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes and defaults reference declared modules)
//! - Validate value ranges (timeouts, forward budget and connection limit > 0, bind address)
//! - Reject malformed or duplicate route declarations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::routing::matcher::{Pattern, PatternError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route #{index}: {source}")]
    InvalidPattern {
        index: usize,
        #[source]
        source: PatternError,
    },

    #[error("duplicate route name '{0}'")]
    DuplicateRouteName(String),

    #[error("duplicate module name '{0}'")]
    DuplicateModule(String),

    #[error("{context} references undeclared module '{module}'")]
    UnknownModule { context: String, module: String },

    #[error("application.max_forwards must be greater than 0")]
    ZeroForwards,

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroTimeout,

    #[error("listener.max_connections must be greater than 0")]
    ZeroConnections,

    #[error("invalid listener.bind_address '{0}'")]
    BindAddress(String),

    #[error("unknown observability.log_format '{0}' (expected pretty or compact)")]
    LogFormat(String),
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut modules = HashSet::new();
    for m in &config.modules {
        if !modules.insert(m.name.as_str()) {
            errors.push(ValidationError::DuplicateModule(m.name.clone()));
        }
    }

    let check_module = |context: String, module: Option<&String>, errors: &mut Vec<_>| {
        if let Some(module) = module {
            if !modules.contains(module.as_str()) {
                errors.push(ValidationError::UnknownModule {
                    context,
                    module: module.clone(),
                });
            }
        }
    };

    let mut names = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if let Err(source) = Pattern::parse(&route.pattern) {
            errors.push(ValidationError::InvalidPattern { index, source });
        }
        if let Some(name) = &route.name {
            if !names.insert(name.as_str()) {
                errors.push(ValidationError::DuplicateRouteName(name.clone()));
            }
        }
        check_module(format!("route '{}'", route.pattern), route.module.as_ref(), &mut errors);
    }

    check_module(
        "application.default_module".to_string(),
        config.application.default_module.as_ref(),
        &mut errors,
    );
    if let Some(nf) = &config.not_found {
        check_module("not_found".to_string(), nf.module.as_ref(), &mut errors);
    }

    if config.application.max_forwards == 0 {
        errors.push(ValidationError::ZeroForwards);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "compact") {
        errors.push(ValidationError::LogFormat(config.observability.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ModuleConfig, RouteConfig};

    fn route(name: Option<&str>, pattern: &str, module: Option<&str>) -> RouteConfig {
        RouteConfig {
            name: name.map(String::from),
            pattern: pattern.to_string(),
            module: module.map(String::from),
            namespace: None,
            controller: None,
            action: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.routes.push(route(Some("a"), "no-slash", None));
        config.routes.push(route(Some("a"), "/:params/x", Some("ghost")));
        config.listener.bind_address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::DuplicateRouteName("a".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownModule { module, .. } if module == "ghost")));
    }

    #[test]
    fn test_module_references() {
        let mut config = AppConfig::default();
        config.modules.push(ModuleConfig {
            name: "frontend".into(),
            class_name: None,
            path: None,
        });
        config.application.default_module = Some("frontend".into());
        config.routes.push(route(None, "/f/:controller", Some("frontend")));
        assert!(validate_config(&config).is_ok());

        config.modules.push(config.modules[0].clone());
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::DuplicateModule("frontend".into())]
        );
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = AppConfig::default();
        config.listener.max_connections = 0;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::ZeroConnections]
        );

        config.timeouts.request_secs = 0;
        config.application.max_forwards = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroTimeout));
        assert!(errors.contains(&ValidationError::ZeroForwards));
        assert!(errors.contains(&ValidationError::ZeroConnections));
    }
}
