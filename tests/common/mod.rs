//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use format_daemon::config::schema::{LineEndingsConfig, RuleSetConfig, StepConfig};
use format_daemon::config::{DaemonConfig, ListenerConfig};
use format_daemon::dispatch::WORKER_THREAD_NAME;
use format_daemon::net::Endpoint;
use format_daemon::rules::{CanonicalState, FormatError, RuleSet};
use format_daemon::{DaemonError, FormatEngine, ShutdownController, StepEngine};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Content marker that makes [`ProbeEngine`] take its configured delay.
pub const SLOW_MARKER: &str = "slow";

/// Step engine that counts calls per lane and can be slowed down.
#[derive(Default)]
pub struct ProbeEngine {
    pub cold_calls: AtomicUsize,
    pub warm_calls: AtomicUsize,
    pub delay: Duration,
}

impl ProbeEngine {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn cold(&self) -> usize {
        self.cold_calls.load(Ordering::SeqCst)
    }

    pub fn warm(&self) -> usize {
        self.warm_calls.load(Ordering::SeqCst)
    }
}

impl FormatEngine for ProbeEngine {
    fn apply(&self, rule_set: &RuleSet, path: &Path, content: &str) -> Result<CanonicalState, FormatError> {
        if std::thread::current().name() == Some(WORKER_THREAD_NAME) {
            self.cold_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.warm_calls.fetch_add(1, Ordering::SeqCst);
        }
        if content.contains(SLOW_MARKER) {
            std::thread::sleep(self.delay);
        }
        StepEngine.apply(rule_set, path, content)
    }
}

/// A project tree with a root build unit and one child build unit.
///
/// ```text
/// root.txt
/// notes.md
/// latin.lat
/// spin.loop
/// child/child.txt
/// ```
pub fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("child")).unwrap();
    fs::write(root.join("root.txt"), "root").unwrap();
    fs::write(root.join("notes.md"), "notes").unwrap();
    fs::write(root.join("latin.lat"), "latin").unwrap();
    fs::write(root.join("spin.loop"), "x").unwrap();
    fs::write(root.join("child/child.txt"), "child").unwrap();
    dir
}

pub fn rule_set(name: &str, dir: &str, target: &str, steps: Vec<StepConfig>) -> RuleSetConfig {
    RuleSetConfig {
        name: name.to_string(),
        dir: dir.into(),
        target: vec![target.to_string()],
        exclude: Vec::new(),
        encoding: "UTF-8".to_string(),
        line_endings: LineEndingsConfig::Unix,
        steps,
    }
}

pub fn trim_and_newline() -> Vec<StepConfig> {
    vec![StepConfig::TrimTrailingWhitespace, StepConfig::EndWithNewline]
}

/// Root `**/*.txt` trims whitespace; child `*.txt` upper-cases `a` to `A`
/// so the two are distinguishable; `*.lat` is ISO-8859-1; `*.loop` never
/// converges.
pub fn config(root: &Path) -> DaemonConfig {
    let mut latin = rule_set("latin", ".", "*.lat", trim_and_newline());
    latin.encoding = "ISO-8859-1".to_string();

    let mut config = DaemonConfig::default();
    config.project_root = root.to_path_buf();
    config.listener = ListenerConfig {
        bind_address: Some("127.0.0.1:0".to_string()),
        unix_socket: None,
    };
    config.dispatch.drain_timeout_secs = 5;
    config.rule_sets = vec![
        rule_set("rootTxt", ".", "**/*.txt", trim_and_newline()),
        rule_set(
            "childTxt",
            "child",
            "*.txt",
            vec![StepConfig::Replace {
                find: "a".to_string(),
                replacement: "A".to_string(),
            }],
        ),
        latin,
        rule_set(
            "loop",
            ".",
            "*.loop",
            vec![StepConfig::Replace {
                find: "x".to_string(),
                replacement: "xx".to_string(),
            }],
        ),
    ];
    config
}

/// A daemon running on a background task.
pub struct TestDaemon {
    pub endpoint: Endpoint,
    pub controller: ShutdownController,
    pub handle: JoinHandle<Result<(), DaemonError>>,
}

impl TestDaemon {
    /// Base URL for TCP daemons.
    pub fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::Tcp(addr) => format!("http://{addr}"),
            Endpoint::Unix(path) => panic!("daemon listens on unix socket {}", path.display()),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        match &self.endpoint {
            Endpoint::Unix(path) => path.clone(),
            Endpoint::Tcp(addr) => panic!("daemon listens on tcp {addr}"),
        }
    }

    /// Wait for the daemon task to finish.
    pub async fn join(self) -> Result<(), DaemonError> {
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("daemon did not stop in time")
            .expect("daemon task panicked")
    }
}

pub async fn spawn_daemon(config: DaemonConfig, engine: Arc<dyn FormatEngine>) -> TestDaemon {
    let daemon = format_daemon::start(&config, engine).await.unwrap();
    let endpoint = daemon.endpoint().clone();
    let controller = daemon.controller();
    let handle = tokio::spawn(daemon.run());
    TestDaemon {
        endpoint,
        controller,
        handle,
    }
}

/// Client that does not keep idle connections, so a stopped daemon is not
/// kept alive by the pool.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
