//! Shared harness for pipeline and HTTP host tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use keel::events::{EventKind, EventsManager, EventAction};
use keel::http::Response;
use keel::mvc::{
    bind, ActionHandle, Application, Controller, Di, Forward, OutputBuffer, Returned, View,
    ViewError, ViewVars,
};
use keel::routing::{RouteDefaults, RouteTable};

/// Ordered record of everything the pipeline touched.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }

    /// Event names only, in firing order.
    pub fn events(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with("application:"))
            .collect()
    }
}

/// View that logs `start`/`render`/`finish` and renders `[controller/action]`.
pub struct RecordingView {
    log: Log,
}

impl RecordingView {
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl View for RecordingView {
    fn start(&mut self) -> OutputBuffer {
        self.log.push("view:start");
        OutputBuffer::new()
    }

    fn render(
        &mut self,
        buffer: &mut OutputBuffer,
        controller: &str,
        action: &str,
        vars: &ViewVars,
    ) -> Result<(), ViewError> {
        self.log.push("view:render");
        buffer.write(&format!("[{}/{}]", controller, action));
        if let Some(title) = vars.get("title").and_then(|v| v.as_str()) {
            buffer.write(title);
        }
        Ok(())
    }

    fn finish(&mut self, buffer: OutputBuffer) -> String {
        self.log.push("view:finish");
        buffer.into_content()
    }
}

/// Controller registered as `TestController`, reachable at `/test/<action>`.
pub struct TestController {
    log: Log,
}

impl Controller for TestController {
    fn initialize(&mut self, _di: &Di) {
        self.log.push("controller:initialize");
    }

    fn action(&mut self, action: &str) -> Option<ActionHandle<'_>> {
        let log = self.log.clone();
        match action {
            "hello" => bind(|_| Ok("Hello World".into())),
            "cancel" => bind(|_| Ok(Returned::Cancel)),
            "show" => bind(move |ctx| {
                log.push(format!("action:show {:?}", ctx.params()));
                ctx.set_var("title", "Post");
                Ok(Returned::Nothing)
            }),
            "quiet" => bind(|ctx| {
                ctx.disable_view();
                Ok(Returned::Nothing)
            }),
            "prebuilt" => bind(|_| {
                Ok(Response::prebuilt("built")
                    .with_status(201)
                    .with_header("X-Built", "yes")
                    .into())
            }),
            "loop" => bind(|ctx| {
                ctx.forward(Forward::action("loop"));
                Ok(Returned::Nothing)
            }),
            "hop" => bind(|ctx| {
                ctx.forward(Forward::to("other", "landing").with_params(vec!["7".into()]));
                Ok(Returned::Nothing)
            }),
            "fail" => bind(|_| Err(keel::mvc::DispatchError::Action("boom".into()))),
            _ => None,
        }
    }
}

/// Forward target, registered as `OtherController`.
pub struct OtherController;

impl Controller for OtherController {
    fn action(&mut self, action: &str) -> Option<ActionHandle<'_>> {
        match action {
            "landing" => bind(|ctx| Ok(format!("landed {}", ctx.param(0).unwrap_or("-")).into())),
            _ => None,
        }
    }
}

/// Base container with the recording view and both controllers.
pub fn di(log: &Log) -> Di {
    let mut di = Di::new();
    let view_log = log.clone();
    di.set_view(move || Box::new(RecordingView::new(view_log.clone())));
    let controller_log = log.clone();
    di.set_controller("TestController", move || {
        Box::new(TestController {
            log: controller_log.clone(),
        })
    });
    di.set_controller("OtherController", || Box::new(OtherController));
    di
}

/// Record every fired event name into `log`.
pub fn record_events(events: &mut EventsManager, log: &Log) {
    let log = log.clone();
    events.attach_all(move |event| {
        log.push(event.name());
        EventAction::Continue
    });
}

/// Application over the default routes with recording collaborators.
pub fn application(log: &Log) -> Application {
    application_with(log, RouteTable::new(RouteDefaults::default()))
}

/// Like [`application`], with `routes` ahead of the default routes.
pub fn application_with(log: &Log, mut routes: RouteTable) -> Application {
    routes.add_default_routes().unwrap();
    let mut app = Application::new(routes);
    app.set_di(di(log));
    record_events(app.events_mut(), log);
    app
}

/// Make `kind` answer `Abort`.
pub fn abort_on(app: &mut Application, kind: EventKind) {
    app.events_mut().attach(kind, |_| EventAction::Abort);
}
