//! Cold-start gate.
//!
//! # Responsibilities
//! - Grant exactly one caller "first" status per rule set
//! - Make concurrent callers wait for the first caller's outcome
//! - Let every later caller take the warm path without waiting
//!
//! # States
//! ```text
//! (absent) ──first caller──▶ Preparing ──success──▶ Warm
//!                                 │
//!                                 └──failure / cancelled──▶ (absent)
//! ```
//!
//! # Design Decisions
//! - The table-wide lock covers only the lookup-and-insert, never the work
//! - Each preparing record carries a one-shot signal (watch channel)
//! - A failed cold start evicts the record: waiters re-enter the gate and one
//!   of them becomes the next first caller

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::rules::RuleSetId;

/// Outcome broadcast by the first caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColdStartSignal {
    Pending,
    Completed,
    Failed(Arc<str>),
}

/// Per-rule-set record.
#[derive(Debug)]
enum ColdStartRecord {
    /// A first caller is preparing the rule set.
    Preparing {
        generation: u64,
        signal: watch::Receiver<ColdStartSignal>,
    },
    /// Preparation succeeded; all callers take the warm path.
    Warm,
}

/// Which lane a caller ended up on.
enum Lane {
    Cold(FirstCaller),
    Warm,
}

enum Admission {
    First(FirstCaller),
    Wait(watch::Receiver<ColdStartSignal>),
    Warm,
}

#[derive(Debug, Default)]
struct Records {
    next_generation: u64,
    by_rule_set: HashMap<RuleSetId, ColdStartRecord>,
}

/// One-time initialization barrier keyed by rule set identity.
#[derive(Debug, Default, Clone)]
pub struct ColdStartGate {
    records: Arc<Mutex<Records>>,
}

impl ColdStartGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `cold` if this caller is the first user of `rule_set`, otherwise
    /// wait for the first user and run `warm`.
    ///
    /// Exactly one of the two closures is invoked.
    pub async fn run_with_gate<T, E, C, CF, W, WF>(
        &self,
        rule_set: RuleSetId,
        cold: C,
        warm: W,
    ) -> Result<T, E>
    where
        C: FnOnce() -> CF,
        CF: Future<Output = Result<T, E>>,
        W: FnOnce() -> WF,
        WF: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match self.admit(rule_set).await {
            Lane::Cold(first) => {
                tracing::info!(rule_set = %rule_set, "Cold start: preparing rule set");
                let result = cold().await;
                match &result {
                    Ok(_) => first.complete(),
                    Err(e) => first.fail(e.to_string()),
                }
                result
            }
            Lane::Warm => warm().await,
        }
    }

    /// Whether `rule_set` finished its cold start.
    pub fn is_warm(&self, rule_set: RuleSetId) -> bool {
        matches!(
            self.records.lock().by_rule_set.get(&rule_set),
            Some(ColdStartRecord::Warm)
        )
    }

    /// Number of rule sets that finished their cold start.
    pub fn warm_count(&self) -> usize {
        self.records
            .lock()
            .by_rule_set
            .values()
            .filter(|record| matches!(record, ColdStartRecord::Warm))
            .count()
    }

    async fn admit(&self, rule_set: RuleSetId) -> Lane {
        loop {
            let mut signal = match self.enter(rule_set) {
                Admission::First(first) => return Lane::Cold(first),
                Admission::Warm => return Lane::Warm,
                Admission::Wait(signal) => signal,
            };

            tracing::debug!(rule_set = %rule_set, "Waiting for cold start in progress");
            let outcome = signal
                .wait_for(|s| *s != ColdStartSignal::Pending)
                .await
                .map(|s| (*s).clone());
            match outcome {
                Ok(ColdStartSignal::Completed) => return Lane::Warm,
                Ok(ColdStartSignal::Failed(reason)) => {
                    tracing::warn!(rule_set = %rule_set, reason = %reason, "Cold start failed; retrying admission");
                }
                // First caller went away without signalling; its guard evicted the record.
                Ok(ColdStartSignal::Pending) | Err(_) => {
                    tracing::warn!(rule_set = %rule_set, "Cold start abandoned; retrying admission");
                }
            }
        }
    }

    fn enter(&self, rule_set: RuleSetId) -> Admission {
        let mut records = self.records.lock();
        match records.by_rule_set.get(&rule_set) {
            Some(ColdStartRecord::Warm) => return Admission::Warm,
            Some(ColdStartRecord::Preparing { signal, .. }) => return Admission::Wait(signal.clone()),
            None => {}
        }

        let generation = records.next_generation;
        records.next_generation += 1;
        let (tx, rx) = watch::channel(ColdStartSignal::Pending);
        records
            .by_rule_set
            .insert(rule_set, ColdStartRecord::Preparing { generation, signal: rx });
        Admission::First(FirstCaller {
            records: Arc::clone(&self.records),
            rule_set,
            generation,
            signal: tx,
            settled: false,
        })
    }
}

/// Held by the caller granted "first" status. Evicts its record if dropped
/// without settling, so waiters are never stranded.
struct FirstCaller {
    records: Arc<Mutex<Records>>,
    rule_set: RuleSetId,
    generation: u64,
    signal: watch::Sender<ColdStartSignal>,
    settled: bool,
}

impl FirstCaller {
    fn complete(mut self) {
        self.records
            .lock()
            .by_rule_set
            .insert(self.rule_set, ColdStartRecord::Warm);
        self.settled = true;
        self.signal.send_replace(ColdStartSignal::Completed);
        metrics::counter!("format_daemon_cold_starts_total", "outcome" => "completed").increment(1);
    }

    fn fail(mut self, reason: String) {
        self.evict();
        self.settled = true;
        tracing::error!(rule_set = %self.rule_set, reason = %reason, "Cold start failed");
        self.signal.send_replace(ColdStartSignal::Failed(reason.into()));
        metrics::counter!("format_daemon_cold_starts_total", "outcome" => "failed").increment(1);
    }

    fn evict(&self) {
        let mut records = self.records.lock();
        let ours = matches!(
            records.by_rule_set.get(&self.rule_set),
            Some(ColdStartRecord::Preparing { generation, .. }) if *generation == self.generation
        );
        if ours {
            records.by_rule_set.remove(&self.rule_set);
        }
    }
}

impl Drop for FirstCaller {
    fn drop(&mut self) {
        if !self.settled {
            self.evict();
            metrics::counter!("format_daemon_cold_starts_total", "outcome" => "abandoned").increment(1);
        }
    }
}
