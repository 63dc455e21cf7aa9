use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of lifecycle transition recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Registered,
    Unregistered,
    Starting,
    Started,
    StartFailed,
    StartTimeout,
    Stopped,
    StopFailed,
    Restarted,
    Killed,
    KillFailed,
    Crashed,
    Healed,
    HealFailed,
    OperationStarted,
    OperationCompleted,
    OperationFailed,
    OperationCancelled,
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub event_type: EventType,
    pub details: String,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl ProcessEvent {
    pub fn new(service: &str, event_type: EventType, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            service: service.to_string(),
            event_type,
            details: details.into(),
            pid: None,
            port: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }
}
