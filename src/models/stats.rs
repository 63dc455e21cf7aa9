use chrono::{DateTime, Utc};
use serde::Serialize;

/// One point-in-time reading of host resources.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Global CPU usage (percent, 0-100)
    pub cpu_percent: f32,

    /// Memory in use (MB)
    pub memory_used_mb: f64,

    /// Memory still available (MB)
    pub memory_available_mb: f64,

    /// Memory in use (percent, 0-100)
    pub memory_percent: f32,

    /// Disk space used on the root volume (GB)
    pub disk_used_gb: f64,

    /// Disk space free on the root volume (GB)
    pub disk_free_gb: f64,

    /// Processes currently managed by the supervisor
    pub managed_processes: usize,

    /// Services observed running at the last check
    pub running_services: usize,
}

impl ResourceSnapshot {
    /// Reading used when the OS query fails.
    pub fn zeroed() -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_percent: 0.0,
            memory_used_mb: 0.0,
            memory_available_mb: 0.0,
            memory_percent: 0.0,
            disk_used_gb: 0.0,
            disk_free_gb: 0.0,
            managed_processes: 0,
            running_services: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.memory_used_mb > 0.0 || self.memory_available_mb > 0.0
    }
}

/// Per-process sample taken on a monitor tick.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessSample {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}
