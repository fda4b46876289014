//! Request pipeline orchestration.
//!
//! # Responsibilities
//! - Run one request from URI to sent response (`Application::handle`)
//! - Fire lifecycle events and honor their answers
//! - Short-circuit on match callbacks and prebuilt responses
//! - Start the routed module, dispatch, render the implicit view
//!
//! # Design Decisions
//! - Synchronous and request-scoped: router, dispatcher, DI scope and view
//!   are created per call; only configuration is shared
//! - The route table sits behind `ArcSwap` so a reload never blocks a request
//! - Headers and cookies are sent exactly once, at the very end of whichever
//!   path produced the response

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::AppConfig;
use crate::events::{AppEvent, EventAction, EventKind, EventsManager};
use crate::http::response::Response;
use crate::mvc::di::Di;
use crate::mvc::dispatcher::{Dispatcher, Returned, DEFAULT_MAX_FORWARDS, DEFAULT_NAMESPACE_SERVICE};
use crate::mvc::error::{AppResult, ConfigurationError, ReloadError};
use crate::mvc::module::{FileModuleLoader, ModuleLoader, ModuleRegistry};
use crate::mvc::view::ViewScope;
use crate::observability::metrics;
use crate::routing::matcher::PatternError;
use crate::routing::{CallbackResult, RouteTable, Router};

/// Result of a handled request.
#[derive(Debug)]
pub enum Outcome {
    /// The response that was produced and sent.
    Sent(Response),
    /// A lifecycle subscriber stopped the request.
    Aborted { event: EventKind },
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Sent(r) => Some(r),
            Outcome::Aborted { .. } => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Outcome::Sent(r) => Some(r),
            Outcome::Aborted { .. } => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted { .. })
    }
}

type RouteExtension = dyn Fn(&mut RouteTable) -> Result<(), PatternError> + Send + Sync;

/// The MVC application.
pub struct Application {
    di: Option<Di>,
    events: EventsManager,
    routes: ArcSwap<RouteTable>,
    extensions: Vec<Arc<RouteExtension>>,
    modules: ModuleRegistry,
    loader: Arc<dyn ModuleLoader>,
    default_module: Option<String>,
    implicit_view: bool,
    max_forwards: u32,
}

impl Application {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            di: None,
            events: EventsManager::new(),
            routes: ArcSwap::from_pointee(routes),
            extensions: Vec::new(),
            modules: ModuleRegistry::new(),
            loader: Arc::new(FileModuleLoader::new()),
            default_module: None,
            implicit_view: true,
            max_forwards: DEFAULT_MAX_FORWARDS,
        }
    }

    /// Build routes, modules and options from configuration.
    ///
    /// The DI container is not created here; attach one with [`Application::set_di`].
    pub fn from_config(config: &AppConfig, base_dir: Option<PathBuf>) -> Result<Self, PatternError> {
        let mut app = Self::new(RouteTable::from_config(config)?);
        app.modules = ModuleRegistry::from_config(&config.modules);
        app.default_module = config.application.default_module.clone();
        app.implicit_view = config.application.implicit_view;
        app.max_forwards = config.application.max_forwards;
        if let Some(dir) = base_dir {
            app.loader = Arc::new(FileModuleLoader::with_base_dir(dir));
        }
        Ok(app)
    }

    pub fn set_di(&mut self, di: Di) -> &mut Self {
        self.di = Some(di);
        self
    }

    pub fn di(&self) -> Option<&Di> {
        self.di.as_ref()
    }

    pub fn di_mut(&mut self) -> Option<&mut Di> {
        self.di.as_mut()
    }

    pub fn events_mut(&mut self) -> &mut EventsManager {
        &mut self.events
    }

    pub fn modules_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.modules
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn set_loader(&mut self, loader: Arc<dyn ModuleLoader>) -> &mut Self {
        self.loader = loader;
        self
    }

    /// Enable or disable automatic view rendering.
    pub fn use_implicit_view(&mut self, enabled: bool) -> &mut Self {
        self.implicit_view = enabled;
        self
    }

    pub fn set_default_module(&mut self, module: Option<String>) -> &mut Self {
        self.default_module = module;
        self
    }

    pub fn set_max_forwards(&mut self, max_forwards: u32) -> &mut Self {
        self.max_forwards = max_forwards;
        self
    }

    /// Current route table snapshot.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    /// Replace the route table. In-flight requests keep their snapshot.
    pub fn swap_routes(&self, routes: RouteTable) {
        tracing::info!(routes = routes.len(), "Route table swapped");
        self.routes.store(Arc::new(routes));
    }

    /// Apply `extend` to the current table and again after every reload.
    ///
    /// Used for routes that live in code rather than configuration.
    pub fn extend_routes<F>(&mut self, extend: F) -> Result<(), PatternError>
    where
        F: Fn(&mut RouteTable) -> Result<(), PatternError> + Send + Sync + 'static,
    {
        let mut table = RouteTable::clone(&self.routes.load());
        extend(&mut table)?;
        self.routes.store(Arc::new(table));
        self.extensions.push(Arc::new(extend));
        Ok(())
    }

    /// Rebuild the route table from a reloaded configuration.
    ///
    /// Only routes are hot-reloadable; modules and services stay as started.
    /// A table that targets a module this process did not start with is
    /// rejected and the current table is kept.
    pub fn reload(&self, config: &AppConfig) -> Result<(), ReloadError> {
        let mut table = RouteTable::from_config(config)?;
        for extend in &self.extensions {
            extend(&mut table)?;
        }
        self.check_modules(&table)?;
        self.swap_routes(table);
        Ok(())
    }

    fn check_modules(&self, table: &RouteTable) -> Result<(), ReloadError> {
        let targets = table
            .routes()
            .iter()
            .map(|route| (format!("route '{}'", route.pattern().as_str()), route.paths()))
            .chain(table.not_found().map(|paths| ("not_found".to_string(), paths)));

        for (context, paths) in targets {
            if let Some(module) = &paths.module {
                if self.modules.get(module).is_none() {
                    return Err(ReloadError::UnknownModule {
                        context,
                        module: module.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Handle one request.
    pub fn handle(&self, uri: Option<&str>) -> AppResult<Outcome> {
        let base = self.di.as_ref().ok_or(ConfigurationError::MissingContainer)?;
        let mut di = base.clone();

        if let Some(outcome) = self.checkpoint(&AppEvent::Boot) {
            return Ok(outcome);
        }

        let mut router = Router::new(self.routes.load_full());
        router.handle(uri);

        // A match callback replaces the module/dispatcher/view pipeline.
        if let Some(callback) = router.matched_route().and_then(|m| m.match_callback.clone()) {
            match callback.call(&di, router.params()) {
                CallbackResult::Body(body) => {
                    tracing::debug!("Match callback produced the body");
                    let mut response = di.response();
                    response.set_content(body);
                    return Ok(Outcome::Sent(send(response)));
                }
                CallbackResult::Response(response) => {
                    tracing::debug!("Match callback produced a response");
                    return Ok(Outcome::Sent(send_prebuilt(response)));
                }
                CallbackResult::Continue => {}
            }
        }

        let module_name = router
            .module_name()
            .map(str::to_string)
            .or_else(|| self.default_module.clone());

        if let Some(name) = module_name.as_deref() {
            if let Some(outcome) = self.checkpoint(&AppEvent::BeforeStartModule { module: name }) {
                return Ok(outcome);
            }

            let module = self.modules.start(name, &mut di, self.loader.as_ref())?;
            tracing::debug!(module = %name, "Module started");

            if let Some(outcome) = self.checkpoint(&AppEvent::AfterStartModule {
                module: name,
                definition: &*module,
            }) {
                return Ok(outcome);
            }
        }

        let mut view = if self.implicit_view {
            Some(di.view().ok_or(ConfigurationError::MissingService("view"))?)
        } else {
            None
        };
        let mut scope = view.as_deref_mut().map(|v| ViewScope::start(v));

        let mut dispatcher = Dispatcher::new(self.max_forwards);
        dispatcher.populate(&router);
        dispatcher.set_default_namespace(
            di.shared::<String>(DEFAULT_NAMESPACE_SERVICE)
                .map(|ns| ns.as_ref().clone()),
        );

        if let Some(outcome) = self.checkpoint(&AppEvent::BeforeHandleRequest {
            dispatcher: &dispatcher,
        }) {
            return Ok(outcome);
        }

        let controller = dispatcher.dispatch(&di)?;

        let response = match dispatcher.take_returned_value() {
            Returned::Cancel => {
                tracing::debug!("Action cancelled the view");
                di.response()
            }
            Returned::Body(body) => {
                let mut response = di.response();
                response.set_content(body);
                response
            }
            returned => {
                if let Some(outcome) = self.checkpoint(&AppEvent::AfterHandleRequest {
                    controller: controller.as_deref(),
                }) {
                    return Ok(outcome);
                }

                let prebuilt = match returned {
                    Returned::Response(response) => Some(response),
                    _ => None,
                };

                if prebuilt.is_none() && controller.is_some() && !dispatcher.is_view_disabled() {
                    if let Some(scope) = scope.as_mut() {
                        let action = self.events.fire(&AppEvent::ViewRender { view: scope.view() });
                        match action {
                            EventAction::Continue => scope.render(
                                dispatcher.controller_name(),
                                dispatcher.action_name(),
                                dispatcher.view_vars(),
                            )?,
                            EventAction::Abort => {
                                tracing::debug!("Automatic view render skipped by subscriber");
                            }
                            EventAction::Override(response) => {
                                return Ok(Outcome::Sent(send_prebuilt(response)));
                            }
                        }
                    }
                }

                let content = scope.take().map(ViewScope::finish);

                match prebuilt {
                    Some(mut response) => {
                        response.mark_prebuilt();
                        response
                    }
                    None => {
                        let mut response = di.response();
                        if let Some(content) = content {
                            response.set_content(content);
                        }
                        response
                    }
                }
            }
        };
        drop(scope);

        if let Some(outcome) = self.checkpoint(&AppEvent::BeforeSendResponse {
            response: &response,
        }) {
            return Ok(outcome);
        }

        tracing::debug!(
            controller = %dispatcher.controller_name(),
            action = %dispatcher.action_name(),
            status = response.status(),
            "Request handled"
        );
        Ok(Outcome::Sent(send(response)))
    }

    /// Fire `event`; `Some` means the pipeline must stop with that outcome.
    fn checkpoint(&self, event: &AppEvent<'_>) -> Option<Outcome> {
        let kind = event.kind();
        match self.events.fire(event) {
            EventAction::Continue => None,
            EventAction::Abort => {
                tracing::warn!(event = %kind, "Request aborted by event subscriber");
                metrics::record_abort(kind);
                Some(Outcome::Aborted { event: kind })
            }
            EventAction::Override(response) => {
                tracing::debug!(event = %kind, "Response overridden by event subscriber");
                Some(Outcome::Sent(send_prebuilt(response)))
            }
        }
    }
}

fn send(mut response: Response) -> Response {
    response.send_headers();
    response.send_cookies();
    response
}

fn send_prebuilt(mut response: Response) -> Response {
    response.mark_prebuilt();
    send(response)
}
