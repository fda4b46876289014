//! End-to-end behavior of `Application::handle`.

use std::path::PathBuf;

use keel::events::{AppEvent, EventAction, EventKind};
use keel::http::Response;
use keel::mvc::{
    AppError, ConfigurationError, DispatchError, ModuleDefinition, Di, Outcome,
};
use keel::mvc::dispatcher::DEFAULT_NAMESPACE_SERVICE;
use keel::routing::{CallbackResult, RouteDefaults, RoutePaths, RouteTable};

mod common;

use common::{abort_on, application, application_with, Log};

fn sent(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Sent(response) => response,
        Outcome::Aborted { event } => panic!("aborted at {}", event),
    }
}

struct MainModule {
    log: Log,
}

impl ModuleDefinition for MainModule {
    fn register_autoloaders(&self, _di: &mut Di) {
        self.log.push("module:autoloaders");
    }

    fn register_services(&self, di: &mut Di) {
        self.log.push("module:services");
        di.set_shared("module.name", "main".to_string());
    }
}

fn with_main_module(app: &mut keel::Application, log: &Log) {
    let module_log = log.clone();
    app.modules_mut().register_class("main", "Main\\Module", None);
    if let Some(di) = app.di_mut() {
        di.set_module_class("Main\\Module", move || {
            Box::new(MainModule {
                log: module_log.clone(),
            })
        });
    }
    app.set_default_module(Some("main".into()));
}

#[test]
fn test_match_callback_string_skips_pipeline() {
    let log = Log::default();
    let mut routes = RouteTable::new(RouteDefaults::default());
    routes
        .add("/cb/:params", RoutePaths::default())
        .unwrap()
        .on_match(|_, params| format!("S:{}", params.join(",")).into());

    let mut app = application_with(&log, routes);
    // Would fail with ModuleNotRegistered if module resolution ran.
    app.set_default_module(Some("ghost".into()));

    let response = sent(app.handle(Some("/cb/a/b")).unwrap());
    assert_eq!(response.content(), Some("S:a,b"));
    assert!(!response.is_prebuilt());
    assert!(response.headers_sent());
    assert!(response.cookies_sent());
    assert_eq!(log.events(), vec!["application:boot"]);
    assert!(!log.contains("view:start"));
}

#[test]
fn test_match_callback_prebuilt_response_returned_unchanged() {
    let log = Log::default();
    let mut routes = RouteTable::new(RouteDefaults::default());
    routes.add("/direct", RoutePaths::default()).unwrap().on_match(|_, _| {
        CallbackResult::Response(Response::prebuilt("R").with_status(202).with_header("X-Direct", "1"))
    });

    let app = application_with(&log, routes);
    let response = sent(app.handle(Some("/direct")).unwrap());

    assert_eq!(response.status(), 202);
    assert_eq!(response.content(), Some("R"));
    assert_eq!(response.headers().get("x-direct"), Some("1"));
    assert!(response.is_prebuilt());
    assert!(response.headers_sent());
    assert!(!log.contains("application:beforeHandleRequest"));
    assert!(!log.contains("controller:initialize"));
}

#[test]
fn test_match_callback_continue_falls_through() {
    let log = Log::default();
    let mut routes = RouteTable::new(RouteDefaults::default());
    routes
        .add("/greet", RoutePaths::controller_action("test", "hello"))
        .unwrap()
        .on_match(|_, _| CallbackResult::Continue);

    let mut app = application_with(&log, routes);
    app.use_implicit_view(false);

    let response = sent(app.handle(Some("/greet")).unwrap());
    assert_eq!(response.content(), Some("Hello World"));
}

#[test]
fn test_abort_at_each_event_stops_pipeline() {
    let order = [
        EventKind::Boot,
        EventKind::BeforeStartModule,
        EventKind::AfterStartModule,
        EventKind::BeforeHandleRequest,
        EventKind::AfterHandleRequest,
        EventKind::BeforeSendResponse,
    ];

    for (i, kind) in order.iter().enumerate() {
        let log = Log::default();
        let mut app = application(&log);
        with_main_module(&mut app, &log);
        abort_on(&mut app, *kind);

        // The quiet action disables the view, so viewRender never fires.
        let outcome = app.handle(Some("/test/quiet")).unwrap();
        assert!(matches!(outcome, Outcome::Aborted { event } if event == *kind), "{}", kind);

        let expected: Vec<String> = order[..=i].iter().map(|k| k.name().to_string()).collect();
        assert_eq!(log.events(), expected, "events after abort at {}", kind);
        assert_eq!(log.count("view:start"), log.count("view:finish"));
    }
}

#[test]
fn test_view_render_abort_only_skips_render() {
    let log = Log::default();
    let mut app = application(&log);
    abort_on(&mut app, EventKind::ViewRender);

    let response = sent(app.handle(Some("/test/show")).unwrap());
    assert_eq!(response.content(), Some(""));
    assert!(!log.contains("view:render"));
    assert!(log.contains("application:beforeSendResponse"));
    assert_eq!(log.count("view:finish"), 1);
}

#[test]
fn test_event_override_replaces_response() {
    let log = Log::default();
    let mut app = application(&log);
    app.events_mut().attach(EventKind::BeforeSendResponse, |event| match event {
        AppEvent::BeforeSendResponse { response } if response.status() == 200 => {
            EventAction::Override(Response::new().with_status(503))
        }
        _ => EventAction::Continue,
    });

    let response = sent(app.handle(Some("/test/hello")).unwrap());
    assert_eq!(response.status(), 503);
    assert!(response.is_prebuilt());
    assert!(response.headers_sent());
}

#[test]
fn test_cancel_leaves_content_empty() {
    let log = Log::default();
    let app = application(&log);

    let response = sent(app.handle(Some("/test/cancel")).unwrap());
    assert_eq!(response.content().unwrap_or(""), "");
    assert!(!log.contains("view:render"));
    assert!(!log.contains("application:afterHandleRequest"));
    assert_eq!(log.count("view:start"), 1);
    assert_eq!(log.count("view:finish"), 1);
}

#[test]
fn test_string_return_with_implicit_view() {
    let log = Log::default();
    let app = application(&log);

    let response = sent(app.handle(Some("/test/hello")).unwrap());
    assert_eq!(response.content(), Some("Hello World"));
    assert!(!log.contains("view:render"));
    assert_eq!(log.count("view:start"), 1);
    assert_eq!(log.count("view:finish"), 1);
}

#[test]
fn test_implicit_view_renders_action() {
    let log = Log::default();
    let app = application(&log);

    let response = sent(app.handle(Some("/test/show/7/8")).unwrap());
    assert_eq!(response.content(), Some("[test/show]Post"));
    assert!(log.contains("action:show [\"7\", \"8\"]"));
    assert_eq!(
        log.events(),
        vec![
            "application:boot",
            "application:beforeHandleRequest",
            "application:afterHandleRequest",
            "application:viewRender",
            "application:beforeSendResponse",
        ]
    );
}

#[test]
fn test_disabled_view_and_prebuilt_action_response() {
    let log = Log::default();
    let app = application(&log);

    let quiet = sent(app.handle(Some("/test/quiet")).unwrap());
    assert_eq!(quiet.content(), Some(""));
    assert!(!log.contains("view:render"));

    let built = sent(app.handle(Some("/test/prebuilt")).unwrap());
    assert_eq!(built.status(), 201);
    assert_eq!(built.content(), Some("built"));
    assert!(built.is_prebuilt());
    assert!(built.headers_sent());
}

#[test]
fn test_without_implicit_view_no_view_is_created() {
    let log = Log::default();
    let mut app = application(&log);
    app.use_implicit_view(false);

    let response = sent(app.handle(Some("/test/show")).unwrap());
    assert_eq!(response.content(), None);
    assert!(!log.contains("view:start"));
}

#[test]
fn test_module_with_missing_path_fails_before_dispatch() {
    let log = Log::default();
    let mut app = application(&log);
    app.modules_mut()
        .register_class("mod", "Mod", Some(PathBuf::from("mod.src")));
    app.set_default_module(Some("mod".into()));

    let err = app.handle(Some("/test/hello")).unwrap_err();
    assert!(matches!(
        err,
        AppError::Configuration(ConfigurationError::ModulePathMissing { .. })
    ));
    assert!(log.contains("application:beforeStartModule"));
    assert!(!log.contains("application:beforeHandleRequest"));
    assert!(!log.contains("view:start"));
}

#[test]
fn test_unregistered_module_is_configuration_error() {
    let log = Log::default();
    let mut app = application(&log);
    app.set_default_module(Some("ghost".into()));

    assert!(matches!(
        app.handle(None),
        Err(AppError::Configuration(ConfigurationError::ModuleNotRegistered(name))) if name == "ghost"
    ));
}

#[test]
fn test_module_services_visible_to_request_only() {
    let log = Log::default();
    let mut app = application(&log);
    with_main_module(&mut app, &log);

    app.handle(Some("/test/hello")).unwrap();
    assert_eq!(
        log.entries().iter().filter(|e| e.starts_with("module:")).collect::<Vec<_>>(),
        vec!["module:autoloaders", "module:services"]
    );
    // Registered into the request scope, not the shared template.
    assert!(!app.di().unwrap().has("module.name"));
}

#[test]
fn test_module_default_namespace() {
    let log = Log::default();
    let mut app = application(&log);
    app.modules_mut().register_factory("shop", |di| {
        di.set_shared(DEFAULT_NAMESPACE_SERVICE, "Shop".to_string());
        di.set_controller("Shop\\TestController", || Box::new(common::OtherController));
        Box::new(NoopModule)
    });
    app.set_default_module(Some("shop".into()));

    let response = sent(app.handle(Some("/test/landing/3")).unwrap());
    assert_eq!(response.content(), Some("landed 3"));
}

struct NoopModule;

impl ModuleDefinition for NoopModule {
    fn register_services(&self, _di: &mut Di) {}
}

#[test]
fn test_self_forward_is_cyclic_routing() {
    let log = Log::default();
    let mut app = application(&log);
    app.set_max_forwards(16);

    let err = app.handle(Some("/test/loop")).unwrap_err();
    assert!(matches!(
        err,
        AppError::Dispatch(DispatchError::CyclicRouting { limit: 16 })
    ));
    // One instance, reused across forwards.
    assert_eq!(log.count("controller:initialize"), 1);
    assert_eq!(log.count("view:start"), log.count("view:finish"));
}

#[test]
fn test_forward_to_other_controller() {
    let log = Log::default();
    let app = application(&log);

    let response = sent(app.handle(Some("/test/hop")).unwrap());
    assert_eq!(response.content(), Some("landed 7"));
}

#[test]
fn test_unknown_controller_and_action() {
    let log = Log::default();
    let app = application(&log);

    let err = app.handle(Some("/nope")).unwrap_err();
    assert!(matches!(&err, AppError::Dispatch(e) if e.is_not_found()));

    let err = app.handle(Some("/test/missing")).unwrap_err();
    assert!(matches!(
        err,
        AppError::Dispatch(DispatchError::ActionNotFound { ref action, .. }) if action == "missing"
    ));

    let err = app.handle(Some("/test/fail")).unwrap_err();
    assert!(matches!(err, AppError::Dispatch(DispatchError::Action(_))));
}

#[test]
fn test_not_found_target() {
    let log = Log::default();
    let mut routes = RouteTable::new(RouteDefaults::default());
    routes.add("/only", RoutePaths::controller_action("test", "hello")).unwrap();
    routes.set_not_found(RoutePaths::controller_action("test", "cancel"));

    let mut app = keel::Application::new(routes);
    app.set_di(common::di(&log));

    let response = sent(app.handle(Some("/anything/else")).unwrap());
    assert_eq!(response.content().unwrap_or(""), "");
    assert_eq!(sent(app.handle(Some("/only?x=1")).unwrap()).content(), Some("Hello World"));
}

#[test]
fn test_response_service_supplies_defaults() {
    let log = Log::default();
    let mut app = application(&log);
    if let Some(di) = app.di_mut() {
        di.set_response(|| Response::new().with_header("Content-Type", "text/html; charset=utf-8"));
    }

    let response = sent(app.handle(Some("/test/hello")).unwrap());
    assert_eq!(response.headers().get("content-type"), Some("text/html; charset=utf-8"));
}
