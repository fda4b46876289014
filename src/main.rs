//! keel server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum, request ID, timeout, limit)
//!                         │
//!                         ▼  spawn_blocking
//!                     mvc::Application::handle
//!                         │
//!         ┌───────────────┼────────────────────────────┐
//!         ▼               ▼                            ▼
//!     routing::Router   mvc::module (start)        events (checkpoints)
//!                         │
//!                         ▼
//!                     mvc::Dispatcher ──▶ Controller action (forward loop)
//!                         │
//!                         ▼
//!                     mvc::view (implicit render)
//!                         │
//!     Client Response     ▼
//!     ◀────────────── http::response (headers + cookies sent once)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use keel::config::watcher::ConfigWatcher;
use keel::http::{HttpServer, Response};
use keel::lifecycle::{signals, startup, Shutdown};
use keel::mvc::{bind, ActionHandle, Controller};
use keel::observability::{logging, metrics};
use keel::routing::{CallbackResult, RoutePaths};

#[derive(Parser, Debug)]
#[command(name = "keel", version, about = "MVC application server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Built-in landing page for the default route.
struct WelcomeController;

impl Controller for WelcomeController {
    fn action(&mut self, action: &str) -> Option<ActionHandle<'_>> {
        match action {
            "index" => bind(|ctx| {
                ctx.set_var("title", "keel");
                ctx.set_var("version", env!("CARGO_PKG_VERSION"));
                Ok(Default::default())
            }),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, base_dir) = startup::load(args.config.as_deref())?;
    logging::init_logging(&config.observability)?;
    startup::report_config(&config, args.config.as_deref());

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "keel v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let mut application = startup::build_application(&config, base_dir)?;
    if let Some(di) = application.di_mut() {
        di.set_controller("IndexController", || Box::new(WelcomeController));
    }
    application.extend_routes(|routes| {
        routes
            .prepend("/health", RoutePaths::default())?
            .named("health")
            .on_match(|_, _| {
                CallbackResult::Response(
                    Response::prebuilt("ok").with_header("content-type", "text/plain"),
                )
            });
        Ok(())
    })?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, application);

    // The watcher handle must outlive the server.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            server.spawn_reloader(updates);
            Some(watcher.run()?)
        }
        None => None,
    };

    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
