//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the routing table from configuration
//! - Start the dispatch service and its serialized lane
//! - Bind the listener and enter `Listening`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The routing table is frozen before the listener exists
//! - Listener binds last (traffic only when ready)

use std::sync::Arc;

use crate::config::DaemonConfig;
use crate::dispatch::FormatService;
use crate::http::DaemonServer;
use crate::lifecycle::shutdown::ShutdownController;
use crate::lifecycle::DaemonError;
use crate::net::{BoundListener, Endpoint};
use crate::routing::RoutingTable;
use crate::rules::FormatEngine;

/// A daemon that is bound and ready to serve.
pub struct Daemon {
    server: DaemonServer,
    listener: BoundListener,
    endpoint: Endpoint,
    controller: ShutdownController,
}

impl Daemon {
    /// Where clients reach this daemon.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Handle for observing state or requesting a stop.
    pub fn controller(&self) -> ShutdownController {
        self.controller.clone()
    }

    /// Serve until stopped, then drain.
    pub async fn run(self) -> Result<(), DaemonError> {
        self.server.run(self.listener).await
    }
}

/// Build every subsystem and bind the listener.
pub async fn start(config: &DaemonConfig, engine: Arc<dyn FormatEngine>) -> Result<Daemon, DaemonError> {
    let controller = ShutdownController::new();

    let table = RoutingTable::build(&config.project_root, &config.rule_sets)?;
    tracing::info!(
        project_root = %table.project_root().display(),
        rule_sets = table.len(),
        "Routing table built"
    );

    let service = FormatService::new(Arc::new(table), engine, config.dispatch.serial_queue_capacity)
        .map_err(DaemonError::Lane)?;

    let listener = match BoundListener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            service.shutdown().await;
            return Err(e.into());
        }
    };
    let endpoint = listener.endpoint();

    controller.set_listening();
    tracing::info!(endpoint = %endpoint, "Daemon listening");

    let server = DaemonServer::new(service, controller.clone(), config.dispatch.clone());
    Ok(Daemon {
        server,
        listener,
        endpoint,
        controller,
    })
}
