use crate::models::{ManagedProcess, ProcessEvent};
use crate::services::event_log::{EventLog, DEFAULT_EVENT_CAP};
use crate::services::monitor::DEFAULT_HISTORY_LEN;
use crate::services::operations::OperationTracker;
use crate::services::registry::ServiceRegistry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Everything guarded by the supervisor's single lock.
pub struct SupervisorState {
    pub registry: ServiceRegistry,
    /// Children spawned by this supervisor, keyed by service name
    pub managed: HashMap<String, ManagedProcess>,
    /// Services with a `start` between its checks and its spawn
    pub starting: HashSet<String>,
    pub operations: OperationTracker,
    pub events: EventLog,
}

impl SupervisorState {
    pub fn new(registry: ServiceRegistry, events: EventLog) -> Self {
        Self {
            registry,
            managed: HashMap::new(),
            starting: HashSet::new(),
            operations: OperationTracker::new(),
            events,
        }
    }

    pub fn record(&mut self, event: ProcessEvent) {
        self.events.append(event);
    }
}

/// Tunables for a supervisor instance.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Registry file; `None` keeps the registry in memory only
    pub registry_path: Option<PathBuf>,
    /// Event file; `None` keeps the log in memory only
    pub events_path: Option<PathBuf>,
    pub event_cap: usize,
    pub history_len: usize,
    pub start_timeout: Duration,
    pub ready_poll_interval: Duration,
    pub kill_retries: u32,
    /// Wait between a kill round and re-checking the port
    pub kill_settle: Duration,
    /// Wait between SIGTERM and the liveness check that decides on SIGKILL
    pub term_grace: Duration,
    /// Pause between stop and start on restart
    pub restart_pause: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            registry_path: None,
            events_path: None,
            event_cap: DEFAULT_EVENT_CAP,
            history_len: DEFAULT_HISTORY_LEN,
            start_timeout: Duration::from_secs(30),
            ready_poll_interval: Duration::from_millis(500),
            kill_retries: 3,
            kill_settle: Duration::from_millis(300),
            term_grace: Duration::from_millis(500),
            restart_pause: Duration::from_secs(1),
        }
    }
}

impl SupervisorSettings {
    /// Persist both files under `dir`.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            registry_path: Some(dir.join("services.json")),
            events_path: Some(dir.join("events.json")),
            ..Self::default()
        }
    }
}
