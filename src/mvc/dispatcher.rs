//! Controller/action dispatch.
//!
//! # Responsibilities
//! - Derive the controller class from namespace and controller name
//! - Instantiate the controller through the DI container
//! - Look up and run the action, capturing its returned value
//! - Follow forwards in a bounded loop
//!
//! # Design Decisions
//! - Action lookup is a typed capability (`Controller::action`), absence is `None`
//! - A forward re-runs the loop; the same controller instance is reused when
//!   the class does not change
//! - More than `max_forwards` forwards is a `CyclicRouting` error

use std::collections::BTreeMap;

use serde_json::Value;

use crate::http::response::Response;
use crate::mvc::di::Di;
use crate::mvc::error::DispatchError;
use crate::observability::metrics;
use crate::routing::Router;

/// Default bound on forwards per request.
pub const DEFAULT_MAX_FORWARDS: u32 = 256;

/// Shared-service key a module can set to change the default controller namespace.
pub const DEFAULT_NAMESPACE_SERVICE: &str = "dispatcher.default_namespace";

/// Variables handed to the view renderer.
pub type ViewVars = BTreeMap<String, Value>;

/// Value returned by the last executed action.
#[derive(Debug, Default)]
pub enum Returned {
    /// No explicit value: the implicit view supplies the body.
    #[default]
    Nothing,
    /// Cancel view rendering; the response stays empty.
    Cancel,
    /// Use as raw response body.
    Body(String),
    /// A finalized response.
    Response(Response),
}

impl From<&str> for Returned {
    fn from(body: &str) -> Self {
        Returned::Body(body.to_string())
    }
}

impl From<String> for Returned {
    fn from(body: String) -> Self {
        Returned::Body(body)
    }
}

impl From<Response> for Returned {
    fn from(response: Response) -> Self {
        Returned::Response(response)
    }
}

/// Target of a forward. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forward {
    pub namespace: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub params: Option<Vec<String>>,
}

impl Forward {
    /// Another action on the current controller.
    pub fn action(action: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            ..Self::default()
        }
    }

    pub fn to(controller: &str, action: &str) -> Self {
        Self {
            controller: Some(controller.to_string()),
            action: Some(action.to_string()),
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = Some(params);
        self
    }
}

pub type ActionResult = Result<Returned, DispatchError>;

/// A resolved action bound to its controller instance.
pub type ActionHandle<'a> = Box<dyn FnOnce(&mut ActionContext<'_>) -> ActionResult + 'a>;

/// Box an action closure as an `ActionHandle`.
pub fn bind<'a, F>(f: F) -> Option<ActionHandle<'a>>
where
    F: FnOnce(&mut ActionContext<'_>) -> ActionResult + 'a,
{
    Some(Box::new(f))
}

/// A request handler.
///
/// ```ignore
/// impl Controller for PostsController {
///     fn action(&mut self, name: &str) -> Option<ActionHandle<'_>> {
///         match name {
///             "index" => bind(|ctx| self.index(ctx)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Controller: Send {
    /// Runs once per instance, before its first action.
    fn initialize(&mut self, _di: &Di) {}

    /// The handler for `action`, or `None` if the controller has no such action.
    fn action(&mut self, action: &str) -> Option<ActionHandle<'_>>;
}

/// What an action sees and can change.
pub struct ActionContext<'a> {
    di: &'a Di,
    controller: &'a str,
    action: &'a str,
    params: &'a [String],
    named: &'a BTreeMap<String, String>,
    view_vars: &'a mut ViewVars,
    forward: Option<Forward>,
    view_disabled: bool,
}

impl<'a> ActionContext<'a> {
    pub fn di(&self) -> &'a Di {
        self.di
    }

    pub fn controller_name(&self) -> &str {
        self.controller
    }

    pub fn action_name(&self) -> &str {
        self.action
    }

    pub fn params(&self) -> &[String] {
        self.params
    }

    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// A `{name}` capture from the route pattern.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Expose a variable to the view.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.view_vars.insert(name.into(), value.into());
    }

    /// Run another action after this one returns.
    pub fn forward(&mut self, target: Forward) {
        self.forward = Some(target);
    }

    /// Skip automatic view rendering for this request.
    pub fn disable_view(&mut self) {
        self.view_disabled = true;
    }
}

/// Request-scoped dispatcher state.
#[derive(Debug)]
pub struct Dispatcher {
    module_name: Option<String>,
    namespace_name: Option<String>,
    default_namespace: Option<String>,
    controller_name: String,
    action_name: String,
    params: Vec<String>,
    named: BTreeMap<String, String>,
    max_forwards: u32,
    forwards: u32,
    returned: Returned,
    view_vars: ViewVars,
    view_disabled: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FORWARDS)
    }
}

impl Dispatcher {
    pub fn new(max_forwards: u32) -> Self {
        Self {
            module_name: None,
            namespace_name: None,
            default_namespace: None,
            controller_name: "index".to_string(),
            action_name: "index".to_string(),
            params: Vec::new(),
            named: BTreeMap::new(),
            max_forwards,
            forwards: 0,
            returned: Returned::Nothing,
            view_vars: ViewVars::new(),
            view_disabled: false,
        }
    }

    /// Copy the routing coordinates resolved by `router`.
    pub fn populate(&mut self, router: &Router) {
        self.module_name = router.module_name().map(str::to_string);
        self.namespace_name = router.namespace_name().map(str::to_string);
        self.controller_name = router.controller_name().to_string();
        self.action_name = router.action_name().to_string();
        self.params = router.params().to_vec();
        self.named = router.named_params();
    }

    pub fn set_module_name(&mut self, module: Option<String>) {
        self.module_name = module;
    }

    pub fn set_namespace_name(&mut self, namespace: Option<String>) {
        self.namespace_name = namespace;
    }

    pub fn set_default_namespace(&mut self, namespace: Option<String>) {
        self.default_namespace = namespace;
    }

    pub fn set_controller_name(&mut self, controller: impl Into<String>) {
        self.controller_name = controller.into();
    }

    pub fn set_action_name(&mut self, action: impl Into<String>) {
        self.action_name = action.into();
    }

    pub fn set_params(&mut self, params: Vec<String>) {
        self.params = params;
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn namespace_name(&self) -> Option<&str> {
        self.namespace_name.as_deref()
    }

    /// Last executed controller name.
    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    /// Last executed action name.
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn forwards(&self) -> u32 {
        self.forwards
    }

    pub fn returned_value(&self) -> &Returned {
        &self.returned
    }

    pub fn take_returned_value(&mut self) -> Returned {
        std::mem::take(&mut self.returned)
    }

    pub fn view_vars(&self) -> &ViewVars {
        &self.view_vars
    }

    pub fn is_view_disabled(&self) -> bool {
        self.view_disabled
    }

    /// Fully qualified controller class for the current coordinates.
    pub fn handler_class(&self) -> String {
        let name = format!("{}Controller", camelize(&self.controller_name));
        match self
            .namespace_name
            .as_deref()
            .or(self.default_namespace.as_deref())
        {
            Some(ns) if !ns.is_empty() => format!("{}\\{}", ns.trim_end_matches('\\'), name),
            _ => name,
        }
    }

    /// Run the target action, following forwards.
    ///
    /// Returns the last executed controller instance.
    pub fn dispatch(&mut self, di: &Di) -> Result<Option<Box<dyn Controller>>, DispatchError> {
        let mut current: Option<(String, Box<dyn Controller>)> = None;

        loop {
            let class = self.handler_class();

            let instance = match current.take() {
                Some((loaded, instance)) if loaded == class => (loaded, instance),
                _ => {
                    let mut instance = di
                        .controller(&class)
                        .ok_or_else(|| DispatchError::ControllerNotFound { class: class.clone() })?;
                    instance.initialize(di);
                    (class, instance)
                }
            };
            let (class, mut controller) = instance;

            tracing::debug!(
                class = %class,
                action = %self.action_name,
                forwards = self.forwards,
                "Executing action"
            );

            let handle = controller.action(&self.action_name).ok_or_else(|| {
                DispatchError::ActionNotFound {
                    controller: class.clone(),
                    action: self.action_name.clone(),
                }
            })?;

            let mut ctx = ActionContext {
                di,
                controller: &self.controller_name,
                action: &self.action_name,
                params: &self.params,
                named: &self.named,
                view_vars: &mut self.view_vars,
                forward: None,
                view_disabled: false,
            };
            let result = handle(&mut ctx);
            let forward = ctx.forward.take();
            self.view_disabled |= ctx.view_disabled;

            self.returned = result?;
            current = Some((class, controller));

            let Some(target) = forward else {
                break;
            };

            self.forwards += 1;
            metrics::record_forward();
            if self.forwards > self.max_forwards {
                tracing::error!(limit = self.max_forwards, "Forward limit exceeded");
                return Err(DispatchError::CyclicRouting {
                    limit: self.max_forwards,
                });
            }
            self.apply_forward(target);
        }

        Ok(current.map(|(_, controller)| controller))
    }

    fn apply_forward(&mut self, target: Forward) {
        if let Some(namespace) = target.namespace {
            self.namespace_name = Some(namespace);
        }
        if let Some(controller) = target.controller {
            self.controller_name = controller;
        }
        if let Some(action) = target.action {
            self.action_name = action;
        }
        if let Some(params) = target.params {
            self.params = params;
        }
    }
}

/// `blog-posts` / `blog_posts` → `BlogPosts`.
pub fn camelize(name: &str) -> String {
    name.split(|c| c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct PostsController {
        initialized: u32,
    }

    impl PostsController {
        fn index(&mut self, ctx: &mut ActionContext<'_>) -> ActionResult {
            ctx.set_var("initialized", self.initialized);
            Ok(Returned::Nothing)
        }

        fn show(&mut self, ctx: &mut ActionContext<'_>) -> ActionResult {
            Ok(format!("post {}", ctx.param(0).unwrap_or("?")).into())
        }

        fn legacy(&mut self, ctx: &mut ActionContext<'_>) -> ActionResult {
            ctx.forward(Forward::action("show").with_params(vec!["9".into()]));
            Ok(Returned::Cancel)
        }

        fn elsewhere(&mut self, ctx: &mut ActionContext<'_>) -> ActionResult {
            ctx.forward(Forward::to("about", "index"));
            Ok(Returned::Nothing)
        }

        fn spin(&mut self, ctx: &mut ActionContext<'_>) -> ActionResult {
            ctx.forward(Forward::action("spin"));
            Ok(Returned::Nothing)
        }
    }

    impl Controller for PostsController {
        fn initialize(&mut self, _di: &Di) {
            self.initialized += 1;
        }

        fn action(&mut self, action: &str) -> Option<ActionHandle<'_>> {
            match action {
                "index" => bind(|ctx| self.index(ctx)),
                "show" => bind(|ctx| self.show(ctx)),
                "legacy" => bind(|ctx| self.legacy(ctx)),
                "elsewhere" => bind(|ctx| self.elsewhere(ctx)),
                "spin" => bind(|ctx| self.spin(ctx)),
                _ => None,
            }
        }
    }

    struct AboutController;

    impl Controller for AboutController {
        fn action(&mut self, action: &str) -> Option<ActionHandle<'_>> {
            match action {
                "index" => bind(|_| Ok("about".into())),
                _ => None,
            }
        }
    }

    fn di() -> Di {
        let mut di = Di::new();
        di.set_controller("PostsController", || Box::new(PostsController::default()));
        di.set_controller("AboutController", || Box::new(AboutController));
        di
    }

    fn dispatcher(controller: &str, action: &str) -> Dispatcher {
        let mut d = Dispatcher::new(8);
        d.set_controller_name(controller);
        d.set_action_name(action);
        d
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("posts"), "Posts");
        assert_eq!(camelize("blog-posts"), "BlogPosts");
        assert_eq!(camelize("user_profile"), "UserProfile");
    }

    #[test]
    fn test_handler_class_namespace() {
        let mut d = dispatcher("blog-posts", "index");
        assert_eq!(d.handler_class(), "BlogPostsController");

        d.set_default_namespace(Some("App\\Controllers".into()));
        assert_eq!(d.handler_class(), "App\\Controllers\\BlogPostsController");

        d.set_namespace_name(Some("Admin\\".into()));
        assert_eq!(d.handler_class(), "Admin\\BlogPostsController");
    }

    #[test]
    fn test_dispatch_captures_returned_value() {
        let mut d = dispatcher("posts", "show");
        d.set_params(vec!["3".into()]);

        let controller = d.dispatch(&di()).unwrap();
        assert!(controller.is_some());
        assert!(matches!(d.returned_value(), Returned::Body(b) if b == "post 3"));
    }

    #[test]
    fn test_initialize_runs_once_across_forwards() {
        let mut d = dispatcher("posts", "legacy");
        d.dispatch(&di()).unwrap();
        assert_eq!(d.action_name(), "show");
        assert_eq!(d.forwards(), 1);
        assert!(matches!(d.returned_value(), Returned::Body(b) if b == "post 9"));

        let mut d = dispatcher("posts", "index");
        d.dispatch(&di()).unwrap();
        assert_eq!(d.view_vars().get("initialized"), Some(&Value::from(1)));
    }

    #[test]
    fn test_forward_to_other_controller() {
        let mut d = dispatcher("posts", "elsewhere");
        d.dispatch(&di()).unwrap();
        assert_eq!(d.controller_name(), "about");
        assert!(matches!(d.take_returned_value(), Returned::Body(b) if b == "about"));
        assert!(matches!(d.returned_value(), Returned::Nothing));
    }

    #[test]
    fn test_missing_controller_and_action() {
        let mut d = dispatcher("ghost", "index");
        assert!(matches!(
            d.dispatch(&di()),
            Err(DispatchError::ControllerNotFound { class }) if class == "GhostController"
        ));

        let mut d = dispatcher("posts", "nope");
        assert!(matches!(
            d.dispatch(&di()),
            Err(DispatchError::ActionNotFound { .. })
        ));
    }

    #[test]
    fn test_self_forward_is_bounded() {
        let mut d = dispatcher("posts", "spin");
        assert!(matches!(
            d.dispatch(&di()),
            Err(DispatchError::CyclicRouting { limit: 8 })
        ));
        assert_eq!(d.forwards(), 9);
    }
}
