use crate::error::{Result, SupervisorError};
use crate::models::{
    BackgroundOperation, OperationStatus, OperationUpdate, OperationView, OperationsSummary,
};
use chrono::{Duration, Utc};
use std::collections::HashMap;

pub const OVERLOAD_CPU_PERCENT: f64 = 80.0;
pub const OVERLOAD_MEMORY_MB: f64 = 4000.0;

/// In-memory store of background operations.
#[derive(Default)]
pub struct OperationTracker {
    operations: HashMap<String, BackgroundOperation>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking. An id that is still in progress cannot be reused; a finished one can.
    pub fn start(
        &mut self,
        id: &str,
        kind: &str,
        description: &str,
        total_size: Option<u64>,
        pid: Option<u32>,
    ) -> Result<BackgroundOperation> {
        if let Some(existing) = self.operations.get(id) {
            if !existing.status.is_final() {
                return Err(SupervisorError::OperationInProgress(id.to_string()));
            }
        }
        let op = BackgroundOperation::new(id, kind, description, total_size, pid);
        self.operations.insert(id.to_string(), op.clone());
        Ok(op)
    }

    /// Apply the fields that are set. Unknown and finalized ids are left alone.
    ///
    /// A final `status` is ignored here; finishing an operation goes through `complete`.
    pub fn update(&mut self, id: &str, update: OperationUpdate) -> Result<BackgroundOperation> {
        let op = self.live_mut(id)?;

        if let Some(downloaded) = update.downloaded {
            op.downloaded = downloaded;
            if update.progress.is_none() {
                if let Some(total) = op.total_size.filter(|&t| t > 0) {
                    op.progress = (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                }
            }
        }
        if let Some(progress) = update.progress {
            op.progress = if progress.is_nan() {
                op.progress
            } else {
                progress.clamp(0.0, 100.0)
            };
        }
        if let Some(status) = update.status.filter(|s| !s.is_final()) {
            op.status = status;
        }
        if let Some(error) = update.error {
            op.error = Some(error);
        }
        if let Some(impact) = update.resource_impact {
            op.resource_impact = Some(impact);
        }
        op.updated_at = Utc::now();
        Ok(op.clone())
    }

    /// Finalize once. `error == "cancelled"` records a cancellation; any other error a failure.
    pub fn complete(&mut self, id: &str, error: Option<String>) -> Result<BackgroundOperation> {
        let op = self.live_mut(id)?;

        match error {
            Some(e) if e.eq_ignore_ascii_case("cancelled") => {
                op.status = OperationStatus::Cancelled;
                op.error = Some(e);
            }
            Some(e) => {
                op.status = OperationStatus::Failed;
                op.error = Some(e);
            }
            None => {
                op.status = OperationStatus::Completed;
                op.progress = 100.0;
                if let Some(total) = op.total_size {
                    op.downloaded = total;
                }
            }
        }
        op.updated_at = Utc::now();
        Ok(op.clone())
    }

    fn live_mut(&mut self, id: &str) -> Result<&mut BackgroundOperation> {
        match self.operations.get_mut(id) {
            None => Err(SupervisorError::UnknownOperation(id.to_string())),
            Some(op) if op.status.is_final() => Err(SupervisorError::OperationFinished(id.to_string())),
            Some(op) => Ok(op),
        }
    }

    pub fn get(&self, id: &str) -> Option<&BackgroundOperation> {
        self.operations.get(id)
    }

    /// All operations with their ETA, newest first.
    pub fn list(&self) -> Vec<OperationView> {
        let mut ops: Vec<BackgroundOperation> = self.operations.values().cloned().collect();
        ops.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        ops.into_iter().map(OperationView::from).collect()
    }

    /// Counts plus the resource impact of in-progress operations only.
    pub fn summary(&self) -> OperationsSummary {
        let mut summary = OperationsSummary {
            total: self.operations.len(),
            ..Default::default()
        };

        for op in self.operations.values() {
            match op.status {
                OperationStatus::InProgress => {
                    summary.in_progress += 1;
                    if let Some(impact) = &op.resource_impact {
                        summary.aggregate_cpu_percent += impact.cpu_percent.unwrap_or(0.0);
                        summary.aggregate_memory_mb += impact.memory_mb.unwrap_or(0.0);
                        summary.aggregate_network_mbps += impact.network_mbps.unwrap_or(0.0);
                    }
                }
                OperationStatus::Completed => summary.completed += 1,
                OperationStatus::Failed => summary.failed += 1,
                OperationStatus::Cancelled => summary.cancelled += 1,
                OperationStatus::Pending | OperationStatus::Paused => {}
            }
        }

        summary.overload_risk = summary.aggregate_cpu_percent > OVERLOAD_CPU_PERCENT
            || summary.aggregate_memory_mb > OVERLOAD_MEMORY_MB;
        summary
    }

    /// Drop finalized operations whose last update is older than `max_age`.
    pub fn prune_finished(&mut self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let before = self.operations.len();
        self.operations
            .retain(|_, op| !(op.status.is_final() && op.updated_at < cutoff));
        before - self.operations.len()
    }
}
