//! Dependency injection container.
//!
//! # Responsibilities
//! - Hold class definitions for controllers and modules
//! - Provide the view and response services
//! - Store arbitrary named shared services
//!
//! # Design Decisions
//! - The application keeps a process-wide template; every request works on
//!   its own clone, so modules can register services without locks
//! - Definitions are factories (`Arc<dyn Fn>`), cloning the container only
//!   clones handles
//! - Unknown names are `None`, the caller decides which error to raise

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::http::response::Response;
use crate::mvc::dispatcher::Controller;
use crate::mvc::module::ModuleDefinition;
use crate::mvc::view::View;

pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn ModuleDefinition> + Send + Sync>;
pub type ViewFactory = Arc<dyn Fn() -> Box<dyn View> + Send + Sync>;
pub type ResponseFactory = Arc<dyn Fn() -> Response + Send + Sync>;

#[derive(Clone, Default)]
pub struct Di {
    controllers: HashMap<String, ControllerFactory>,
    modules: HashMap<String, ModuleFactory>,
    view: Option<ViewFactory>,
    response: Option<ResponseFactory>,
    shared: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Di {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller class, e.g. `Blog\PostsController`.
    pub fn set_controller<F>(&mut self, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        self.controllers.insert(class.into(), Arc::new(factory));
        self
    }

    pub fn has_controller(&self, class: &str) -> bool {
        self.controllers.contains_key(class)
    }

    /// Instantiate a controller class.
    pub fn controller(&self, class: &str) -> Option<Box<dyn Controller>> {
        self.controllers.get(class).map(|f| f())
    }

    /// Register a module definition class.
    pub fn set_module_class<F>(&mut self, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ModuleDefinition> + Send + Sync + 'static,
    {
        self.modules.insert(class.into(), Arc::new(factory));
        self
    }

    pub fn module_class(&self, class: &str) -> Option<Box<dyn ModuleDefinition>> {
        self.modules.get(class).map(|f| f())
    }

    pub fn set_view<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn View> + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(factory));
        self
    }

    pub fn has_view(&self) -> bool {
        self.view.is_some()
    }

    pub fn view(&self) -> Option<Box<dyn View>> {
        self.view.as_ref().map(|f| f())
    }

    /// Customize the response service (default headers, status).
    pub fn set_response<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Response + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(factory));
        self
    }

    /// A fresh response from the response service.
    pub fn response(&self) -> Response {
        self.response.as_ref().map(|f| f()).unwrap_or_default()
    }

    /// Store a shared service under `name`.
    pub fn set_shared<T>(&mut self, name: impl Into<String>, value: T) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.shared.insert(name.into(), Arc::new(value));
        self
    }

    /// Fetch a shared service. `None` if absent or of another type.
    pub fn shared<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.shared
            .get(name)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn has(&self, name: &str) -> bool {
        self.shared.contains_key(name)
    }
}

impl fmt::Debug for Di {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut controllers: Vec<_> = self.controllers.keys().collect();
        controllers.sort();
        let mut shared: Vec<_> = self.shared.keys().collect();
        shared.sort();
        f.debug_struct("Di")
            .field("controllers", &controllers)
            .field("modules", &self.modules.len())
            .field("view", &self.view.is_some())
            .field("shared", &shared)
            .finish()
    }
}
