use crate::models::{OperationStatus, OperationView, ServiceStatus};
use crate::supervisor::DashboardSummary;
use lazy_static::lazy_static;
use prometheus::{
    register_gauge_vec_with_registry, register_gauge_with_registry, Encoder, Gauge, GaugeVec,
    Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::Arc;
use sysinfo::System;

pub struct MetricsRegistry {
    registry: Registry,

    // per service
    pub service_up: GaugeVec,
    pub service_conflict: GaugeVec,

    // per managed child
    pub managed_cpu_percent: GaugeVec,
    pub managed_memory_mb: GaugeVec,

    // host
    pub system_cpu_percent: Gauge,
    pub system_memory_used_mb: Gauge,
    pub system_disk_free_gb: Gauge,

    // background operations
    pub operations_in_progress: Gauge,
    pub operation_progress_percent: GaugeVec,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let hostname = System::host_name().unwrap_or_else(|| "unknown".to_string());
        let registry = Registry::new_custom(
            Some("supervisor".to_string()),
            Some(HashMap::from([("hostname".to_string(), hostname)])),
        )?;

        let service_up = register_gauge_vec_with_registry!(
            Opts::new("service_up", "Service is running (1) or not (0)"),
            &["service", "status"],
            registry
        )?;

        let service_conflict = register_gauge_vec_with_registry!(
            Opts::new("service_conflict", "Service port is held by an unexpected process"),
            &["service", "port"],
            registry
        )?;

        let managed_cpu_percent = register_gauge_vec_with_registry!(
            Opts::new("managed_cpu_percent", "CPU usage of a supervisor-spawned process"),
            &["service", "pid"],
            registry
        )?;

        let managed_memory_mb = register_gauge_vec_with_registry!(
            Opts::new("managed_memory_mb", "Resident memory of a supervisor-spawned process in MB"),
            &["service", "pid"],
            registry
        )?;

        let system_cpu_percent = register_gauge_with_registry!(
            Opts::new("system_cpu_percent", "Host CPU usage percentage"),
            registry
        )?;

        let system_memory_used_mb = register_gauge_with_registry!(
            Opts::new("system_memory_used_mb", "Host memory in use in MB"),
            registry
        )?;

        let system_disk_free_gb = register_gauge_with_registry!(
            Opts::new("system_disk_free_gb", "Free space on the root disk in GB"),
            registry
        )?;

        let operations_in_progress = register_gauge_with_registry!(
            Opts::new("operations_in_progress", "Background operations currently in progress"),
            registry
        )?;

        let operation_progress_percent = register_gauge_vec_with_registry!(
            Opts::new("operation_progress_percent", "Progress of an in-progress background operation"),
            &["id", "kind"],
            registry
        )?;

        Ok(Self {
            registry,
            service_up,
            service_conflict,
            managed_cpu_percent,
            managed_memory_mb,
            system_cpu_percent,
            system_memory_used_mb,
            system_disk_free_gb,
            operations_in_progress,
            operation_progress_percent,
        })
    }

    /// Replace every gauge with the values of one dashboard pull.
    ///
    /// Label sets are reset first so removed services and finished operations disappear.
    pub fn observe(&self, dashboard: &DashboardSummary, operations: &[OperationView]) {
        self.service_up.reset();
        self.service_conflict.reset();
        self.managed_cpu_percent.reset();
        self.managed_memory_mb.reset();
        self.operation_progress_percent.reset();

        for (status, services) in &dashboard.services_by_status {
            let status_label = status_label(*status);
            let up = if *status == ServiceStatus::Running { 1.0 } else { 0.0 };
            for service in services {
                self.service_up
                    .with_label_values(&[service.name(), status_label])
                    .set(up);
            }
        }

        for conflict in &dashboard.conflicts {
            self.service_conflict
                .with_label_values(&[conflict.service.as_str(), &conflict.port.to_string()])
                .set(1.0);
        }

        for process in &dashboard.managed_processes {
            let pid = process.pid.to_string();
            let labels = [process.service.as_str(), pid.as_str()];
            self.managed_cpu_percent
                .with_label_values(&labels)
                .set(f64::from(process.cpu_percent));
            self.managed_memory_mb
                .with_label_values(&labels)
                .set(process.memory_mb);
        }

        let resources = &dashboard.resources;
        self.system_cpu_percent.set(f64::from(resources.cpu_percent));
        self.system_memory_used_mb.set(resources.memory_used_mb);
        self.system_disk_free_gb.set(resources.disk_free_gb);

        self.operations_in_progress
            .set(dashboard.operations.in_progress as f64);
        for view in operations
            .iter()
            .filter(|v| v.operation.status == OperationStatus::InProgress)
        {
            self.operation_progress_percent
                .with_label_values(&[view.operation.id.as_str(), view.operation.kind.as_str()])
                .set(view.operation.progress);
        }
    }

    pub fn render(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn status_label(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Running => "running",
        ServiceStatus::Starting => "starting",
        ServiceStatus::Stopping => "stopping",
        ServiceStatus::Stopped => "stopped",
        ServiceStatus::Failed => "failed",
        ServiceStatus::PortConflict => "port_conflict",
        ServiceStatus::Unknown => "unknown",
    }
}

lazy_static! {
    pub static ref METRICS: Arc<MetricsRegistry> =
        Arc::new(MetricsRegistry::new().expect("supervisor metric names are unique"));
}
