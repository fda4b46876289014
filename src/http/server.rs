//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the pipeline handler
//! - Wire up middleware (tracing, timeout, concurrency limit, request ID)
//! - Bind server to listener, drain on shutdown
//! - Run `Application::handle` off the async workers
//! - Map pipeline outcomes and errors to HTTP statuses
//! - Apply reloaded route tables

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::lifecycle::Shutdown;
use crate::mvc::{AppError, Application, Outcome};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub application: Arc<Application>,
}

/// HTTP host for the pipeline.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    application: Arc<Application>,
}

impl HttpServer {
    pub fn new(config: AppConfig, application: Application) -> Self {
        let application = Arc::new(application);
        let state = AppState {
            application: application.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            application,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(app_handler))
            .route("/", any(app_handler))
            .with_state(state)
            .layer(SetResponseHeaderLayer::if_not_present(
                axum::http::header::SERVER,
                HeaderValue::from_static("keel"),
            ))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The axum router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn application(&self) -> Arc<Application> {
        self.application.clone()
    }

    /// Apply reloaded configurations until the channel closes.
    pub fn spawn_reloader(&self, mut updates: mpsc::UnboundedReceiver<AppConfig>) -> JoinHandle<()> {
        let application = self.application.clone();
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                match application.reload(&config) {
                    Ok(()) => tracing::info!("Routes reloaded"),
                    Err(e) => tracing::error!(error = %e, "Reloaded routes rejected"),
                }
            }
        })
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.config.listener.max_connections,
            "HTTP server starting"
        );

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                // A closed channel also means shutdown.
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Run the pipeline for one request.
async fn app_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    tracing::debug!(request_id = %request_id, method = %request.method(), uri = %uri, "Handling request");

    let application = state.application.clone();
    let path = uri.clone();
    let result = tokio::task::spawn_blocking(move || application.handle(Some(&path))).await;

    match result {
        Ok(Ok(Outcome::Sent(response))) => {
            let status = response.status();
            tracing::info!(request_id = %request_id, uri = %uri, status, "Request complete");
            metrics::record_request("sent", status, started);
            response.into_response()
        }
        Ok(Ok(Outcome::Aborted { event })) => {
            tracing::info!(request_id = %request_id, uri = %uri, event = %event, "Request aborted");
            metrics::record_request("aborted", 204, started);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Err(err)) => {
            let status = error_status(&err);
            if status == StatusCode::NOT_FOUND {
                tracing::warn!(request_id = %request_id, uri = %uri, error = %err, "Not found");
            } else {
                tracing::error!(request_id = %request_id, uri = %uri, error = %err, "Pipeline failed");
            }
            metrics::record_request("error", status.as_u16(), started);
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
        Err(join) => {
            tracing::error!(request_id = %request_id, uri = %uri, error = %join, "Pipeline task panicked");
            metrics::record_request("error", 500, started);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// HTTP status for a pipeline error.
pub fn error_status(err: &AppError) -> StatusCode {
    match err {
        AppError::Dispatch(e) if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
