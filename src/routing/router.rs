//! Route lookup and dispatch coordinates.
//!
//! # Responsibilities
//! - Store compiled routes (`RouteTable`, process-wide, read-only)
//! - Resolve a URI to a `RouteMatch` (`Router`, one per request)
//! - Fall back to not-found or default coordinates when nothing matches
//!
//! # Design Decisions
//! - Immutable table after construction (shared via `Arc` without locks)
//! - First declared matching route wins
//! - Captured values override fixed route paths, which override defaults
//! - Explicit no-match: `matched_route()` is `None`, coordinates fall back

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::http::response::Response;
use crate::mvc::di::Di;
use crate::routing::matcher::{normalize_uri, Captures, Pattern, PatternError};

/// What a match callback produced.
#[derive(Debug)]
pub enum CallbackResult {
    /// Use as the body of the shared response.
    Body(String),
    /// A finalized response, returned as is.
    Response(Response),
    /// Fall through to the module/dispatcher pipeline.
    Continue,
}

impl From<&str> for CallbackResult {
    fn from(body: &str) -> Self {
        CallbackResult::Body(body.to_string())
    }
}

impl From<String> for CallbackResult {
    fn from(body: String) -> Self {
        CallbackResult::Body(body)
    }
}

impl From<Response> for CallbackResult {
    fn from(response: Response) -> Self {
        CallbackResult::Response(response)
    }
}

type CallbackFn = dyn Fn(&Di, &[String]) -> CallbackResult + Send + Sync;

/// Direct handler attached to a route; bypasses module and dispatcher.
#[derive(Clone)]
pub struct MatchCallback(Arc<CallbackFn>);

impl MatchCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Di, &[String]) -> CallbackResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, di: &Di, params: &[String]) -> CallbackResult {
        (self.0)(di, params)
    }
}

impl fmt::Debug for MatchCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MatchCallback")
    }
}

/// Fixed coordinates attached to a route (or used as not-found target).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutePaths {
    pub module: Option<String>,
    pub namespace: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
}

impl RoutePaths {
    pub fn controller_action(controller: &str, action: &str) -> Self {
        Self {
            controller: Some(controller.to_string()),
            action: Some(action.to_string()),
            ..Self::default()
        }
    }
}

/// Fallback coordinates when neither the route nor the URI supply one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefaults {
    pub namespace: Option<String>,
    pub controller: String,
    pub action: String,
}

impl Default for RouteDefaults {
    fn default() -> Self {
        Self {
            namespace: None,
            controller: "index".to_string(),
            action: "index".to_string(),
        }
    }
}

/// A declared route.
#[derive(Debug, Clone)]
pub struct Route {
    name: Option<String>,
    pattern: Pattern,
    paths: RoutePaths,
    callback: Option<MatchCallback>,
}

impl Route {
    pub fn new(pattern: Pattern, paths: RoutePaths) -> Self {
        Self {
            name: None,
            pattern,
            paths,
            callback: None,
        }
    }

    /// Name the route (used in logs and the CLI).
    pub fn named(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a direct match callback.
    pub fn on_match<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Di, &[String]) -> CallbackResult + Send + Sync + 'static,
    {
        self.callback = Some(MatchCallback::new(f));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn paths(&self) -> &RoutePaths {
        &self.paths
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }
}

/// Ordered, immutable-at-runtime route list.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    defaults: RouteDefaults,
    not_found: Option<RoutePaths>,
}

impl RouteTable {
    pub fn new(defaults: RouteDefaults) -> Self {
        Self {
            routes: Vec::new(),
            defaults,
            not_found: None,
        }
    }

    /// Build the table declared in configuration.
    ///
    /// Configured routes come first; the default routes (when enabled)
    /// are appended so declared routes always win.
    pub fn from_config(config: &AppConfig) -> Result<Self, PatternError> {
        let app = &config.application;
        let mut table = Self::new(RouteDefaults {
            namespace: app.default_namespace.clone(),
            controller: app.default_controller.clone(),
            action: app.default_action.clone(),
        });

        for rc in &config.routes {
            let route = table.add(
                &rc.pattern,
                RoutePaths {
                    module: rc.module.clone(),
                    namespace: rc.namespace.clone(),
                    controller: rc.controller.clone(),
                    action: rc.action.clone(),
                },
            )?;
            if let Some(name) = &rc.name {
                route.named(name.clone());
            }
        }

        if app.default_routes {
            table.add_default_routes()?;
        }

        table.not_found = config.not_found.as_ref().map(|nf| RoutePaths {
            module: nf.module.clone(),
            namespace: nf.namespace.clone(),
            controller: Some(nf.controller.clone()),
            action: Some(nf.action.clone()),
        });

        Ok(table)
    }

    /// Append a route. The returned handle allows naming and callbacks.
    pub fn add(&mut self, pattern: &str, paths: RoutePaths) -> Result<&mut Route, PatternError> {
        let pattern = Pattern::parse(pattern)?;
        self.routes.push(Route::new(pattern, paths));
        let idx = self.routes.len() - 1;
        Ok(&mut self.routes[idx])
    }

    /// Insert a route ahead of every existing one.
    pub fn prepend(&mut self, pattern: &str, paths: RoutePaths) -> Result<&mut Route, PatternError> {
        let pattern = Pattern::parse(pattern)?;
        self.routes.insert(0, Route::new(pattern, paths));
        Ok(&mut self.routes[0])
    }

    /// `/`, `/:controller` and `/:controller/:action/:params`.
    pub fn add_default_routes(&mut self) -> Result<(), PatternError> {
        self.add("/", RoutePaths::default())?;
        self.add("/:controller", RoutePaths::default())?;
        self.add("/:controller/:action/:params", RoutePaths::default())?;
        Ok(())
    }

    pub fn set_not_found(&mut self, paths: RoutePaths) {
        self.not_found = Some(paths);
    }

    pub fn not_found(&self) -> Option<&RoutePaths> {
        self.not_found.as_ref()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn defaults(&self) -> &RouteDefaults {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn resolve(&self, path: &str) -> Option<(&Route, Captures)> {
        self.routes
            .iter()
            .find_map(|route| route.pattern.matches(path).map(|caps| (route, caps)))
    }
}

/// Resolved handler coordinates for one URI.
#[derive(Debug, Clone, Serialize)]
pub struct RouteMatch {
    pub route_name: Option<String>,
    pub pattern: String,
    pub module: Option<String>,
    pub namespace: Option<String>,
    pub controller: String,
    pub action: String,
    pub params: Vec<String>,
    pub named: BTreeMap<String, String>,
    #[serde(skip)]
    pub match_callback: Option<MatchCallback>,
}

/// Per-request router state.
#[derive(Debug)]
pub struct Router {
    table: Arc<RouteTable>,
    matched: Option<RouteMatch>,
    module: Option<String>,
    namespace: Option<String>,
    controller: String,
    action: String,
    params: Vec<String>,
}

impl Router {
    pub fn new(table: Arc<RouteTable>) -> Self {
        let defaults = table.defaults.clone();
        Self {
            table,
            matched: None,
            module: None,
            namespace: defaults.namespace,
            controller: defaults.controller,
            action: defaults.action,
            params: Vec::new(),
        }
    }

    /// Resolve `uri` (`None` means `/`) and store the result.
    pub fn handle(&mut self, uri: Option<&str>) {
        let path = normalize_uri(uri.unwrap_or("/"));
        let defaults = &self.table.defaults;

        match self.table.resolve(path) {
            Some((route, caps)) => {
                let paths = &route.paths;
                let matched = RouteMatch {
                    route_name: route.name.clone(),
                    pattern: route.pattern.as_str().to_string(),
                    module: caps.module.or_else(|| paths.module.clone()),
                    namespace: caps
                        .namespace
                        .or_else(|| paths.namespace.clone())
                        .or_else(|| defaults.namespace.clone()),
                    controller: caps
                        .controller
                        .or_else(|| paths.controller.clone())
                        .unwrap_or_else(|| defaults.controller.clone()),
                    action: caps
                        .action
                        .or_else(|| paths.action.clone())
                        .unwrap_or_else(|| defaults.action.clone()),
                    params: caps.params,
                    named: caps.named,
                    match_callback: route.callback.clone(),
                };

                tracing::debug!(
                    path = %path,
                    pattern = %matched.pattern,
                    controller = %matched.controller,
                    action = %matched.action,
                    "Route matched"
                );

                self.module = matched.module.clone();
                self.namespace = matched.namespace.clone();
                self.controller = matched.controller.clone();
                self.action = matched.action.clone();
                self.params = matched.params.clone();
                self.matched = Some(matched);
            }
            None => {
                let fallback = self.table.not_found.clone().unwrap_or_default();
                tracing::debug!(path = %path, not_found = self.table.not_found.is_some(), "No route matched");

                self.module = fallback.module;
                self.namespace = fallback.namespace.or_else(|| defaults.namespace.clone());
                self.controller = fallback
                    .controller
                    .unwrap_or_else(|| defaults.controller.clone());
                self.action = fallback.action.unwrap_or_else(|| defaults.action.clone());
                self.params = Vec::new();
                self.matched = None;
            }
        }
    }

    pub fn matched_route(&self) -> Option<&RouteMatch> {
        self.matched.as_ref()
    }

    pub fn was_matched(&self) -> bool {
        self.matched.is_some()
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn namespace_name(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn controller_name(&self) -> &str {
        &self.controller
    }

    pub fn action_name(&self) -> &str {
        &self.action
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Named captures of the matched route (empty when unmatched).
    pub fn named_params(&self) -> BTreeMap<String, String> {
        self.matched
            .as_ref()
            .map(|m| m.named.clone())
            .unwrap_or_default()
    }
}
