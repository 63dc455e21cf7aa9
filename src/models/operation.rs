use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl OperationStatus {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

/// Estimated load an operation puts on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceImpact {
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<f64>,
    #[serde(default)]
    pub network_mbps: Option<f64>,
}

/// A long-running background job (model pull, install, seeding) tracked for progress.
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundOperation {
    pub id: String,
    pub kind: String,
    pub description: String,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Progress in percent, always within [0, 100]
    pub progress: f64,
    /// Total size, in the same unit as `downloaded`
    pub total_size: Option<u64>,
    pub downloaded: u64,
    pub pid: Option<u32>,
    pub error: Option<String>,
    pub resource_impact: Option<ResourceImpact>,
}

impl BackgroundOperation {
    pub fn new(id: &str, kind: &str, description: &str, total_size: Option<u64>, pid: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            status: OperationStatus::InProgress,
            started_at: now,
            updated_at: now,
            progress: 0.0,
            total_size,
            downloaded: 0,
            pid,
            error: None,
            resource_impact: None,
        }
    }

    /// Seconds until completion at the average rate so far.
    ///
    /// `None` unless the total size is known, something has been downloaded, at least one
    /// second has elapsed and progress is below 100.
    pub fn eta_seconds_at(&self, now: DateTime<Utc>) -> Option<f64> {
        let total = self.total_size?;
        if self.downloaded == 0 || self.progress >= 100.0 {
            return None;
        }
        let elapsed = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        if elapsed < 1.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.downloaded) as f64;
        let rate = self.downloaded as f64 / elapsed;
        Some(remaining / rate)
    }

    pub fn eta_seconds(&self) -> Option<f64> {
        self.eta_seconds_at(Utc::now())
    }
}

/// Partial update; only the fields that are set change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationUpdate {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub downloaded: Option<u64>,
    #[serde(default)]
    pub status: Option<OperationStatus>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub resource_impact: Option<ResourceImpact>,
}

/// An operation plus its derived ETA, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct OperationView {
    #[serde(flatten)]
    pub operation: BackgroundOperation,
    pub eta_seconds: Option<f64>,
}

impl From<BackgroundOperation> for OperationView {
    fn from(operation: BackgroundOperation) -> Self {
        let eta_seconds = operation.eta_seconds();
        Self { operation, eta_seconds }
    }
}

/// Aggregate over all tracked operations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationsSummary {
    pub total: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub aggregate_cpu_percent: f64,
    pub aggregate_memory_mb: f64,
    pub aggregate_network_mbps: f64,
    pub overload_risk: bool,
}

/// Answer to "should the caller be warned before starting another heavy operation".
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationWarning {
    pub warn: bool,
    pub reasons: Vec<String>,
}
