//! Ordered subscriber list for application lifecycle events.

use std::fmt;
use std::sync::Arc;

use crate::http::response::Response;
use crate::mvc::dispatcher::{Controller, Dispatcher};
use crate::mvc::module::ModuleDefinition;
use crate::mvc::view::View;

/// Event identity without payload, used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Boot,
    BeforeStartModule,
    AfterStartModule,
    BeforeHandleRequest,
    ViewRender,
    AfterHandleRequest,
    BeforeSendResponse,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Boot => "application:boot",
            EventKind::BeforeStartModule => "application:beforeStartModule",
            EventKind::AfterStartModule => "application:afterStartModule",
            EventKind::BeforeHandleRequest => "application:beforeHandleRequest",
            EventKind::ViewRender => "application:viewRender",
            EventKind::AfterHandleRequest => "application:afterHandleRequest",
            EventKind::BeforeSendResponse => "application:beforeSendResponse",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle event with its typed payload.
pub enum AppEvent<'a> {
    Boot,
    BeforeStartModule {
        module: &'a str,
    },
    AfterStartModule {
        module: &'a str,
        definition: &'a dyn ModuleDefinition,
    },
    BeforeHandleRequest {
        dispatcher: &'a Dispatcher,
    },
    ViewRender {
        view: &'a dyn View,
    },
    AfterHandleRequest {
        controller: Option<&'a dyn Controller>,
    },
    BeforeSendResponse {
        response: &'a Response,
    },
}

impl AppEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            AppEvent::Boot => EventKind::Boot,
            AppEvent::BeforeStartModule { .. } => EventKind::BeforeStartModule,
            AppEvent::AfterStartModule { .. } => EventKind::AfterStartModule,
            AppEvent::BeforeHandleRequest { .. } => EventKind::BeforeHandleRequest,
            AppEvent::ViewRender { .. } => EventKind::ViewRender,
            AppEvent::AfterHandleRequest { .. } => EventKind::AfterHandleRequest,
            AppEvent::BeforeSendResponse { .. } => EventKind::BeforeSendResponse,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl fmt::Debug for AppEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a subscriber wants the pipeline to do next.
///
/// `Default` is not implemented; subscribers answer explicitly.
#[derive(Debug)]
pub enum EventAction {
    /// Keep going.
    Continue,
    /// Stop the request gracefully (`viewRender`: skip automatic render).
    Abort,
    /// Stop and answer with this response.
    Override(Response),
}

impl EventAction {
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

type Listener = Arc<dyn Fn(&AppEvent<'_>) -> EventAction + Send + Sync>;

/// Publish/subscribe hub for lifecycle events.
///
/// Subscribers run in attachment order. The first answer other than
/// `Continue` stops propagation and is returned by `fire`.
#[derive(Clone, Default)]
pub struct EventsManager {
    listeners: Vec<(Option<EventKind>, Listener)>,
}

impl EventsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event.
    pub fn attach<F>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(&AppEvent<'_>) -> EventAction + Send + Sync + 'static,
    {
        self.listeners.push((Some(kind), Arc::new(f)));
    }

    /// Subscribe to every `application:*` event.
    pub fn attach_all<F>(&mut self, f: F)
    where
        F: Fn(&AppEvent<'_>) -> EventAction + Send + Sync + 'static,
    {
        self.listeners.push((None, Arc::new(f)));
    }

    /// Remove every subscriber of `kind` (not the catch-all ones).
    pub fn detach_all(&mut self, kind: EventKind) {
        self.listeners.retain(|(k, _)| *k != Some(kind));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn fire(&self, event: &AppEvent<'_>) -> EventAction {
        let kind = event.kind();
        for (filter, listener) in &self.listeners {
            if filter.is_some_and(|k| k != kind) {
                continue;
            }
            let action = listener(event);
            if !action.is_continue() {
                tracing::debug!(event = %kind, action = ?action, "Event propagation stopped");
                return action;
            }
        }
        EventAction::Continue
    }
}

impl fmt::Debug for EventsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsManager")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
