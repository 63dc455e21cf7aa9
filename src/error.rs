use crate::models::PortConflict;
use thiserror::Error;

/// Command-level failures reported to the caller of a supervisor operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("service '{0}' has no start command configured")]
    NoStartCommand(String),

    #[error("service '{0}' has no port configured")]
    NoPort(String),

    #[error("service '{name}' is already running (pid {pid})")]
    AlreadyRunning { name: String, pid: u32 },

    #[error("service '{0}' is already being started")]
    StartInProgress(String),

    #[error("port conflict: {0}")]
    PortConflict(PortConflict),

    #[error("failed to spawn '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service '{name}' did not open port {port} within {timeout_secs}s (pid {pid} left running)")]
    ReadinessTimeout {
        name: String,
        port: u16,
        pid: u32,
        timeout_secs: u64,
    },

    #[error("failed to kill pid {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("port {port} still occupied after {attempts} kill attempt(s)")]
    PortStillOccupied { port: u16, attempts: u32 },

    #[error("no free port at or above {0}")]
    NoAvailablePort(u16),

    #[error("stop command for '{name}' failed: {detail}")]
    StopCommand { name: String, detail: String },

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("operation '{0}' is already in progress")]
    OperationInProgress(String),

    #[error("operation '{0}' has already finished")]
    OperationFinished(String),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
