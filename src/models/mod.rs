pub mod event;
pub mod operation;
pub mod process;
pub mod service;
pub mod stats;

pub use event::{EventType, ProcessEvent};
pub use operation::{
    BackgroundOperation, OperationStatus, OperationUpdate, OperationView, OperationWarning,
    OperationsSummary, ResourceImpact,
};
pub use process::{ManagedProcess, PortConflict, PortOccupant, ProcessState};
pub use service::{Environment, Service, ServiceConfig, ServiceRegistration, ServiceStatus};
pub use stats::{ProcessSample, ResourceSnapshot};
