use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Liveness of a process this supervisor spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Running,
    Stopping,
}

/// A child process spawned by the supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct ManagedProcess {
    /// Owning service name
    pub service: String,
    /// Pid of the spawned child
    pub pid: u32,
    pub port: Option<u16>,
    pub started_at: DateTime<Utc>,
    /// Command line the child was started with
    pub command: String,
    pub working_dir: Option<PathBuf>,
    /// CPU usage at the last resample (percent)
    pub cpu_percent: f32,
    /// Resident memory at the last resample (MB)
    pub memory_mb: f64,
    pub state: ProcessState,
}

impl ManagedProcess {
    pub fn new(
        service: &str,
        pid: u32,
        port: Option<u16>,
        command: &str,
        working_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            service: service.to_string(),
            pid,
            port,
            started_at: Utc::now(),
            command: command.to_string(),
            working_dir,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            state: ProcessState::Starting,
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// A process found listening on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortOccupant {
    pub pid: u32,
    pub process_name: String,
}

/// A port whose occupant is not the process its service expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortConflict {
    pub service: String,
    pub port: u16,
    pub expected: String,
    /// `None` when the port is taken but the owner could not be identified
    pub occupant: Option<PortOccupant>,
}

impl std::fmt::Display for PortConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.occupant {
            Some(occ) => write!(
                f,
                "expected {}, found {} on port {}, pid {}",
                self.expected, occ.process_name, self.port, occ.pid
            ),
            None => write!(
                f,
                "expected {}, found an unidentified process on port {}",
                self.expected, self.port
            ),
        }
    }
}
