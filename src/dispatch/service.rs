//! Format request dispatch.
//!
//! # Data Flow
//! ```text
//! FormatRequest
//!     → RoutingTable::resolve (not covered → reply immediately)
//!     → dry run → reply immediately
//!     → accept reply token
//!     → spawned worker: ColdStartGate
//!           first use  → serialized lane → engine.apply
//!           warm       → blocking pool   → engine.apply
//!       → fulfill token
//!     → await pending reply → FormatReply
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::correlator::ReplyCorrelator;
use crate::dispatch::gate::ColdStartGate;
use crate::dispatch::serial::{panic_message, SerialExecutor};
use crate::dispatch::DispatchError;
use crate::routing::RoutingTable;
use crate::rules::{CanonicalState, FormatEngine, RuleSet, TextEncoding};

/// One inbound formatting call.
#[derive(Debug, Clone)]
pub struct FormatRequest {
    pub path: String,
    pub content: String,
    pub dry_run: bool,
}

/// Outcome of a formatting call, ready to be mapped onto a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatReply {
    NotCovered { path: String },
    DryRun,
    Clean,
    Changed { content: Vec<u8>, encoding: TextEncoding },
    DidNotConverge { content: Vec<u8>, encoding: TextEncoding },
    Failed { message: String },
}

impl FormatReply {
    fn from_state(state: CanonicalState, encoding: TextEncoding) -> Self {
        match state {
            CanonicalState::Clean => Self::Clean,
            CanonicalState::Changed { canonical } => Self::Changed {
                content: canonical,
                encoding,
            },
            CanonicalState::DidNotConverge { best_effort } => Self::DidNotConverge {
                content: best_effort,
                encoding,
            },
        }
    }
}

/// Point-in-time counters for the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub rule_sets: usize,
    pub warm_rule_sets: usize,
    pub queued_cold_starts: usize,
    pub pending_replies: usize,
}

/// Routes format requests through the gate and onto the right lane.
#[derive(Clone)]
pub struct FormatService {
    table: Arc<RoutingTable>,
    engine: Arc<dyn FormatEngine>,
    gate: ColdStartGate,
    lane: SerialExecutor,
    replies: ReplyCorrelator<FormatReply>,
}

impl FormatService {
    /// Create the service and start its serialized lane.
    pub fn new(
        table: Arc<RoutingTable>,
        engine: Arc<dyn FormatEngine>,
        serial_queue_capacity: usize,
    ) -> std::io::Result<Self> {
        Ok(Self {
            table,
            engine,
            gate: ColdStartGate::new(),
            lane: SerialExecutor::start(serial_queue_capacity)?,
            replies: ReplyCorrelator::new(),
        })
    }

    /// Format one file's content.
    pub async fn format(&self, request: FormatRequest) -> FormatReply {
        let Some(rule_set) = self.table.resolve(&request.path).cloned() else {
            tracing::info!(path = %request.path, "File not covered by any rule set");
            return FormatReply::NotCovered { path: request.path };
        };

        if request.dry_run {
            tracing::debug!(path = %request.path, rule_set = %rule_set.name(), "Dry run");
            return FormatReply::DryRun;
        }

        let (token, pending) = self.replies.accept();
        let service = self.clone();
        let path = request.path.clone();
        // The worker outlives a cancelled handler so a started cold start always settles.
        tokio::spawn(async move {
            let reply = service.apply(rule_set, request).await;
            service.replies.fulfill(token, reply);
        });

        pending.wait().await.unwrap_or_else(|| {
            tracing::error!(path = %path, "Reply slot closed without a value");
            FormatReply::Failed {
                message: "reply was lost".to_string(),
            }
        })
    }

    /// Encoding the covering rule set uses, if any.
    pub fn encoding(&self, path: &str) -> Option<TextEncoding> {
        self.table.resolve(path).map(|rule_set| rule_set.encoding())
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            rule_sets: self.table.len(),
            warm_rule_sets: self.gate.warm_count(),
            queued_cold_starts: self.lane.queued(),
            pending_replies: self.replies.pending(),
        }
    }

    /// Close the serialized lane after its queued units finish.
    pub async fn shutdown(&self) {
        self.lane.shutdown().await;
    }

    async fn apply(&self, rule_set: Arc<RuleSet>, request: FormatRequest) -> FormatReply {
        let encoding = rule_set.encoding();
        let path = request.path.clone();
        let id = rule_set.id();

        let cold = {
            let job = self.job(Arc::clone(&rule_set), request.clone());
            let lane = self.lane.clone();
            move || async move {
                match timed("cold", lane.submit(job)).await {
                    Ok(result) => result.map_err(DispatchError::from),
                    Err(e) => Err(DispatchError::from(e)),
                }
            }
        };
        let warm = {
            let job = self.job(Arc::clone(&rule_set), request);
            move || async move {
                let handle = tokio::task::spawn_blocking(move || {
                    catch_unwind(AssertUnwindSafe(job))
                        .map_err(|payload| DispatchError::Panicked(panic_message(payload.as_ref())))
                });
                match timed("warm", handle).await {
                    Ok(Ok(result)) => result.map_err(DispatchError::from),
                    Ok(Err(panicked)) => Err(panicked),
                    Err(e) => Err(DispatchError::Join(e.to_string())),
                }
            }
        };

        match self.gate.run_with_gate(id, cold, warm).await {
            Ok(state) => {
                let reply = FormatReply::from_state(state, encoding);
                match &reply {
                    FormatReply::DidNotConverge { .. } => {
                        tracing::warn!(path = %path, rule_set = %rule_set.name(), "Formatting did not converge")
                    }
                    _ => tracing::info!(path = %path, rule_set = %rule_set.name(), "Formatted file"),
                }
                reply
            }
            Err(e) => {
                tracing::error!(path = %path, rule_set = %rule_set.name(), error = %e, "Error formatting file");
                FormatReply::Failed { message: e.to_string() }
            }
        }
    }

    fn job(
        &self,
        rule_set: Arc<RuleSet>,
        request: FormatRequest,
    ) -> impl FnOnce() -> Result<CanonicalState, crate::rules::FormatError> + Send + 'static {
        let engine = Arc::clone(&self.engine);
        move || engine.apply(&rule_set, &PathBuf::from(&request.path), &request.content)
    }
}

async fn timed<F: std::future::Future>(lane: &'static str, work: F) -> F::Output {
    let start = Instant::now();
    let output = work.await;
    metrics::histogram!("format_daemon_format_duration_seconds", "lane" => lane)
        .record(start.elapsed().as_secs_f64());
    output
}
