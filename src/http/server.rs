//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with all endpoints
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Track in-flight requests and refuse new ones while draining
//! - Serve on the bound listener and run the drain sequence on stop

use std::time::{Duration, Instant};

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Router, ServiceExt};
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::DispatchConfig;
use crate::dispatch::FormatService;
use crate::http::handlers;
use crate::http::response;
use crate::lifecycle::{signals, DaemonError, ShutdownController};
use crate::net::{self, BoundListener};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: FormatService,
    pub controller: ShutdownController,
}

/// HTTP front end of the daemon.
pub struct DaemonServer {
    state: AppState,
    config: DispatchConfig,
}

impl DaemonServer {
    pub fn new(service: FormatService, controller: ShutdownController, config: DispatchConfig) -> Self {
        Self {
            state: AppState { service, controller },
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::liveness).post(handlers::format))
            .route("/encoding", get(handlers::encoding))
            .route("/stop", post(handlers::stop))
            .route("/status", get(handlers::status))
            .layer(middleware::from_fn_with_state(self.state.clone(), track_requests))
            .with_state(self.state.clone())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until draining starts, then finish the drain sequence.
    pub async fn run(self, listener: BoundListener) -> Result<(), DaemonError> {
        let endpoint = listener.endpoint();
        let controller = self.state.controller.clone();
        let signal_task = signals::spawn_signal_handler(controller.clone());

        tracing::info!(endpoint = %endpoint, "HTTP server starting");

        let app = NormalizePathLayer::trim_trailing_slash().layer(self.router());
        let app = ServiceExt::<Request>::into_make_service(app);
        let shutdown = {
            let controller = controller.clone();
            async move { controller.draining().await }
        };

        let serve = async move {
            match listener {
                BoundListener::Tcp(listener) => {
                    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
                }
                #[cfg(unix)]
                BoundListener::Unix { listener, .. } => {
                    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
                }
            }
        };
        let drain_timeout = Duration::from_secs(self.config.drain_timeout_secs);

        // Dropping the serve future stops accepting; open connections are
        // left to finish on their own tasks.
        let served = tokio::select! {
            served = serve => served,
            () = controller.drain_deadline(drain_timeout) => {
                tracing::warn!(
                    in_flight = controller.in_flight_count(),
                    timeout_secs = self.config.drain_timeout_secs,
                    "Drain timeout expired, stopping with requests still in flight"
                );
                Ok(())
            }
        };
        if let Err(e) = &served {
            tracing::error!(error = %e, "Server error");
            controller.begin_draining("server error");
        }

        self.state.service.shutdown().await;
        net::cleanup(&endpoint).await;
        signal_task.abort();
        controller.set_stopped();
        tracing::info!("HTTP server stopped");

        served.map_err(DaemonError::Serve)
    }
}

/// Count in-flight requests, refuse work while draining, record metrics.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let endpoint = endpoint_label(request.method(), request.uri().path());
    let start = Instant::now();

    if state.controller.state() >= crate::lifecycle::DaemonState::Draining {
        let response = response::shutting_down();
        metrics::record_request(endpoint, response.status().as_u16(), start);
        return response;
    }

    let _guard = state.controller.in_flight_guard();
    let response = next.run(request).await;
    metrics::record_request(endpoint, response.status().as_u16(), start);
    response
}

fn endpoint_label(method: &Method, path: &str) -> &'static str {
    match (method, path) {
        (&Method::POST, "/") => "format",
        (&Method::GET, "/") => "liveness",
        (_, "/encoding") => "encoding",
        (_, "/stop") => "stop",
        (_, "/status") => "status",
        _ => "other",
    }
}
