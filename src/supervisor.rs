use crate::error::{Result, SupervisorError};
use crate::models::{
    BackgroundOperation, EventType, ManagedProcess, OperationStatus, OperationUpdate,
    OperationView, OperationWarning, OperationsSummary, PortConflict, ProcessEvent, ProcessState,
    ResourceSnapshot, Service, ServiceConfig, ServiceRegistration, ServiceStatus,
};
use crate::services::event_log::EventLog;
use crate::services::monitor::ResourceMonitor;
use crate::services::port_inspector::PortInspector;
use crate::services::process_checker::is_pid_alive;
use crate::services::registry::{observe, ManagedHint, Observation, ServiceRegistry};
use crate::services::snapshotter::ResourceSnapshotter;
use crate::state::{SupervisorSettings, SupervisorState};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const WARN_HOST_CPU_PERCENT: f32 = 80.0;
const WARN_HOST_MEMORY_PERCENT: f32 = 90.0;
const DASHBOARD_EVENTS: usize = 20;

pub(crate) struct Shared {
    pub(crate) state: Mutex<SupervisorState>,
    pub(crate) inspector: Arc<dyn PortInspector>,
    pub(crate) snapshotter: ResourceSnapshotter,
    pub(crate) monitor: ResourceMonitor,
    pub(crate) settings: SupervisorSettings,
}

/// Handle to the one supervisor of this daemon. Cheap to clone; every clone shares state.
///
/// All mutations of services, managed processes, operations and events go through a single
/// lock. The lock is never held across blocking work (spawning, port probes, sleeps, kills),
/// and no method acquires it while already holding it.
#[derive(Clone)]
pub struct Supervisor {
    pub(crate) shared: Arc<Shared>,
}

/// Everything a status view needs, gathered in one call.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub resources: ResourceSnapshot,
    pub services_by_status: BTreeMap<ServiceStatus, Vec<Service>>,
    pub conflicts: Vec<PortConflict>,
    pub recent_events: Vec<ProcessEvent>,
    pub managed_processes: Vec<ManagedProcess>,
    pub operations: OperationsSummary,
    pub totals: DashboardTotals,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardTotals {
    pub services: usize,
    pub running: usize,
    pub stopped: usize,
    pub failed: usize,
    pub conflicts: usize,
    pub managed_processes: usize,
    pub active_operations: usize,
}

impl Supervisor {
    /// Load the registry and event log from the paths in `settings`.
    pub fn new(settings: SupervisorSettings, inspector: Arc<dyn PortInspector>) -> Self {
        let registry = match &settings.registry_path {
            Some(path) => ServiceRegistry::load(path),
            None => ServiceRegistry::in_memory(crate::services::registry::default_services()),
        };
        let events = match &settings.events_path {
            Some(path) => EventLog::load(path, settings.event_cap),
            None => EventLog::in_memory(settings.event_cap),
        };
        Self::from_parts(settings, inspector, registry, events)
    }

    pub fn from_parts(
        settings: SupervisorSettings,
        inspector: Arc<dyn PortInspector>,
        registry: ServiceRegistry,
        events: EventLog,
    ) -> Self {
        let monitor = ResourceMonitor::new(settings.history_len);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SupervisorState::new(registry, events)),
                inspector,
                snapshotter: ResourceSnapshotter::new(),
                monitor,
                settings,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn inspector(&self) -> &dyn PortInspector {
        self.shared.inspector.as_ref()
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.shared.settings
    }

    // ---- registry -------------------------------------------------------------------------

    /// Create or update a service. Returns `true` when it was created.
    pub fn register(&self, reg: ServiceRegistration) -> Result<bool> {
        let mut state = self.lock();
        let name = reg.name.trim().to_string();
        let port = reg.port;
        let created = state.registry.register(reg)?;
        let details = if created { "registered" } else { "registration updated" };
        state.record(ProcessEvent::new(&name, EventType::Registered, details).with_port(port));
        state.registry.persist();
        log::info!("[{}] {}", name, details);
        Ok(created)
    }

    /// Remove a service. `false` if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut state = self.lock();
        if !state.registry.unregister(name) {
            return false;
        }
        state.managed.remove(name);
        state.record(ProcessEvent::new(name, EventType::Unregistered, "unregistered"));
        state.registry.persist();
        log::info!("[{}] unregistered", name);
        true
    }

    /// Registered services as of their last check.
    pub fn services(&self) -> Vec<Service> {
        self.lock().registry.list()
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.lock().registry.get(name).cloned()
    }

    // ---- status ---------------------------------------------------------------------------

    /// Re-check one service and return its derived status.
    pub fn status(&self, name: &str) -> Result<ServiceStatus> {
        let (config, managed) = {
            let state = self.lock();
            let config = state.registry.config(name)?;
            let managed = state.managed.get(name).map(|m| (m.pid, m.state));
            (config, managed)
        };

        let (hint, obs) = self.probe(&config, managed);
        let mut state = self.lock();
        apply_observation(&mut state, name, &obs, hint);
        Ok(obs.status)
    }

    /// Re-check every service.
    pub fn check_all(&self) -> BTreeMap<String, ServiceStatus> {
        self.observe_all()
            .into_iter()
            .map(|(name, obs)| (name, obs.status))
            .collect()
    }

    pub(crate) fn observe_all(&self) -> Vec<(String, Observation)> {
        let targets: Vec<(ServiceConfig, Option<(u32, ProcessState)>)> = {
            let state = self.lock();
            state
                .registry
                .configs()
                .into_iter()
                .map(|config| {
                    let managed = state.managed.get(&config.name).map(|m| (m.pid, m.state));
                    (config, managed)
                })
                .collect()
        };

        let probed: Vec<(String, Option<ManagedHint>, Observation)> = targets
            .into_iter()
            .map(|(config, managed)| {
                let (hint, obs) = self.probe(&config, managed);
                (config.name, hint, obs)
            })
            .collect();

        let mut state = self.lock();
        probed
            .into_iter()
            .map(|(name, hint, obs)| {
                apply_observation(&mut state, &name, &obs, hint);
                (name, obs)
            })
            .collect()
    }

    fn probe(
        &self,
        config: &ServiceConfig,
        managed: Option<(u32, ProcessState)>,
    ) -> (Option<ManagedHint>, Observation) {
        let hint = managed.map(|(pid, state)| ManagedHint {
            pid,
            state,
            alive: is_pid_alive(pid),
        });
        (hint, observe(config, self.inspector(), hint))
    }

    pub fn managed_processes(&self) -> Vec<ManagedProcess> {
        let mut procs: Vec<ManagedProcess> = self.lock().managed.values().cloned().collect();
        procs.sort_by(|a, b| a.service.cmp(&b.service));
        procs
    }

    // ---- resources ------------------------------------------------------------------------

    /// Immediate host reading with current supervisor counts.
    pub fn snapshot_now(&self) -> ResourceSnapshot {
        let mut snapshot = self.shared.snapshotter.snapshot();
        let state = self.lock();
        fill_counts(&mut snapshot, &state);
        snapshot
    }

    pub fn history(&self, minutes: u32) -> Vec<ResourceSnapshot> {
        self.shared.monitor.history(minutes)
    }

    /// Start the background monitor. `false` if it is already running.
    pub fn start_monitor(&self, interval: Duration) -> bool {
        let weak = Arc::downgrade(&self.shared);
        self.shared.monitor.start(interval, move || {
            weak.upgrade().map(|shared| Supervisor { shared }.tick())
        })
    }

    /// Signal the background monitor to exit at its next wake.
    pub fn stop_monitor(&self) -> bool {
        self.shared.monitor.stop()
    }

    pub fn monitor_running(&self) -> bool {
        self.shared.monitor.is_running()
    }

    /// One monitor iteration: host reading, managed-process resample, crash detection.
    pub(crate) fn tick(&self) -> ResourceSnapshot {
        let mut snapshot = self.shared.snapshotter.snapshot();

        let tracked: Vec<(String, u32)> = self
            .lock()
            .managed
            .values()
            .map(|m| (m.service.clone(), m.pid))
            .collect();
        let pids: Vec<u32> = tracked.iter().map(|(_, pid)| *pid).collect();
        let samples = self.shared.snapshotter.sample_processes(&pids);

        let mut vanished = Vec::new();
        {
            let mut state = self.lock();
            for (name, pid) in &tracked {
                match samples.get(pid) {
                    Some(sample) => {
                        if let Some(proc) = state.managed.get_mut(name).filter(|m| m.pid == *pid) {
                            proc.cpu_percent = sample.cpu_percent;
                            proc.memory_mb = sample.memory_mb;
                        }
                    }
                    None => vanished.push(name.clone()),
                }
            }
        }

        for name in vanished {
            if let Err(e) = self.status(&name) {
                log::debug!("[{}] re-check after exit skipped: {}", name, e);
            }
        }

        let mut state = self.lock();
        let pruned = state.operations.prune_finished(ChronoDuration::hours(1));
        if pruned > 0 {
            log::debug!("pruned {} finished operation(s)", pruned);
        }
        fill_counts(&mut snapshot, &state);
        snapshot
    }

    // ---- background operations -------------------------------------------------------------

    pub fn start_operation(
        &self,
        id: &str,
        kind: &str,
        description: &str,
        total_size: Option<u64>,
        pid: Option<u32>,
    ) -> Result<BackgroundOperation> {
        let mut state = self.lock();
        let op = state.operations.start(id, kind, description, total_size, pid)?;
        state.record(
            ProcessEvent::new(id, EventType::OperationStarted, format!("{}: {}", kind, description))
                .with_pid(pid),
        );
        log::info!("operation {} ({}) started", id, kind);
        Ok(op)
    }

    /// Partial update. A final `status` finishes the operation exactly as `complete_operation`
    /// would, event included.
    pub fn update_operation(&self, id: &str, mut update: OperationUpdate) -> Result<BackgroundOperation> {
        let finish = update.status.filter(|s| s.is_final());
        if finish.is_some() {
            update.status = None;
        }

        let mut state = self.lock();
        let op = state.operations.update(id, update)?;
        match finish {
            None => Ok(op),
            Some(status) => {
                let error = match status {
                    OperationStatus::Cancelled => Some("cancelled".to_string()),
                    OperationStatus::Failed => Some(op.error.unwrap_or_else(|| "failed".to_string())),
                    _ => None,
                };
                finish_operation(&mut state, id, error)
            }
        }
    }

    /// Finalize an operation once.
    pub fn complete_operation(&self, id: &str, error: Option<String>) -> Result<BackgroundOperation> {
        finish_operation(&mut self.lock(), id, error)
    }

    pub fn operation(&self, id: &str) -> Result<OperationView> {
        self.lock()
            .operations
            .get(id)
            .cloned()
            .map(OperationView::from)
            .ok_or_else(|| SupervisorError::UnknownOperation(id.to_string()))
    }

    pub fn list_operations(&self) -> Vec<OperationView> {
        self.lock().operations.list()
    }

    pub fn operations_summary(&self) -> OperationsSummary {
        self.lock().operations.summary()
    }

    /// Whether a new heavy operation should come with a warning. Never blocks anything.
    pub fn should_warn_before_operation(&self) -> OperationWarning {
        let summary = self.operations_summary();
        let host = self
            .shared
            .monitor
            .latest()
            .unwrap_or_else(|| self.shared.snapshotter.snapshot());

        let mut reasons = Vec::new();
        if summary.overload_risk {
            reasons.push(format!(
                "running operations estimate {:.0}% CPU and {:.0} MB memory",
                summary.aggregate_cpu_percent, summary.aggregate_memory_mb
            ));
        }
        if host.is_valid() {
            if host.cpu_percent > WARN_HOST_CPU_PERCENT {
                reasons.push(format!("host CPU at {:.0}%", host.cpu_percent));
            }
            if host.memory_percent > WARN_HOST_MEMORY_PERCENT {
                reasons.push(format!("host memory at {:.0}%", host.memory_percent));
            }
        }

        OperationWarning {
            warn: !reasons.is_empty(),
            reasons,
        }
    }

    // ---- audit ----------------------------------------------------------------------------

    pub fn events(&self, limit: usize, service: Option<&str>) -> Vec<ProcessEvent> {
        self.lock().events.recent(limit, service)
    }

    // ---- aggregation ----------------------------------------------------------------------

    pub fn dashboard_summary(&self) -> DashboardSummary {
        let observations = self.observe_all();
        let resources = self.snapshot_now();

        let (services, recent_events, managed_processes, operations) = {
            let state = self.lock();
            let mut managed: Vec<ManagedProcess> = state.managed.values().cloned().collect();
            managed.sort_by(|a, b| a.service.cmp(&b.service));
            (
                state.registry.list(),
                state.events.recent(DASHBOARD_EVENTS, None),
                managed,
                state.operations.summary(),
            )
        };

        let conflicts: Vec<PortConflict> = observations
            .into_iter()
            .filter_map(|(_, obs)| obs.conflict)
            .collect();

        let mut services_by_status: BTreeMap<ServiceStatus, Vec<Service>> = BTreeMap::new();
        for service in services {
            services_by_status
                .entry(service.status)
                .or_default()
                .push(service);
        }

        let count = |status: ServiceStatus| services_by_status.get(&status).map_or(0, Vec::len);
        let totals = DashboardTotals {
            services: services_by_status.values().map(Vec::len).sum(),
            running: count(ServiceStatus::Running),
            stopped: count(ServiceStatus::Stopped),
            failed: count(ServiceStatus::Failed),
            conflicts: conflicts.len(),
            managed_processes: managed_processes.len(),
            active_operations: operations.in_progress,
        };

        DashboardSummary {
            generated_at: Utc::now(),
            resources,
            services_by_status,
            conflicts,
            recent_events,
            managed_processes,
            operations,
            totals,
        }
    }
}

fn finish_operation(
    state: &mut SupervisorState,
    id: &str,
    error: Option<String>,
) -> Result<BackgroundOperation> {
    let op = state.operations.complete(id, error)?;
    let (event_type, details) = match op.status {
        OperationStatus::Cancelled => (EventType::OperationCancelled, "cancelled".to_string()),
        OperationStatus::Failed => (
            EventType::OperationFailed,
            op.error.clone().unwrap_or_default(),
        ),
        _ => (EventType::OperationCompleted, "completed".to_string()),
    };
    state.record(ProcessEvent::new(id, event_type, details).with_pid(op.pid));
    log::info!("operation {} finished: {:?}", id, op.status);
    Ok(op)
}

/// Store a check result, retiring a managed child that has exited.
fn apply_observation(
    state: &mut SupervisorState,
    name: &str,
    obs: &Observation,
    hint: Option<ManagedHint>,
) {
    state.registry.apply(name, obs);

    let Some(hint) = hint else {
        return;
    };
    let same_child = state.managed.get(name).map_or(false, |m| m.pid == hint.pid);
    if !same_child {
        return;
    }

    if obs.managed_exited {
        let port = state.managed.remove(name).and_then(|m| m.port);
        if obs.status == ServiceStatus::Running {
            log::info!("[{}] spawned pid {} exited, service still serving", name, hint.pid);
        } else {
            log::warn!("[{}] managed process {} exited unexpectedly", name, hint.pid);
            state.record(
                ProcessEvent::new(name, EventType::Crashed, "managed process disappeared")
                    .with_pid(Some(hint.pid))
                    .with_port(port),
            );
        }
    } else if obs.status == ServiceStatus::Running {
        if let Some(proc) = state.managed.get_mut(name) {
            proc.state = ProcessState::Running;
        }
    }
}

fn fill_counts(snapshot: &mut ResourceSnapshot, state: &SupervisorState) {
    snapshot.managed_processes = state.managed.len();
    snapshot.running_services = state
        .registry
        .list()
        .iter()
        .filter(|s| s.status == ServiceStatus::Running)
        .count();
}


#[cfg(test)]
mod tests {
    use super::testing::supervisor_with;
    use super::*;
    use crate::models::ResourceImpact;
    use crate::services::port_inspector::testing::FakePortInspector;

    fn config(name: &str, port: Option<u16>, process: &str) -> ServiceConfig {
        ServiceConfig::new(name, port, process, "")
    }

    #[test]
    fn test_register_logs_and_upserts() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        assert!(sup.register(ServiceRegistration::new("api", Some(5001), "API")).unwrap());
        assert!(!sup.register(ServiceRegistration::new("api", Some(5002), "API v2")).unwrap());

        assert_eq!(sup.services().len(), 1);
        assert_eq!(sup.service("api").unwrap().config.port, Some(5002));
        let events = sup.events(10, Some("api"));
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == EventType::Registered));
    }

    #[test]
    fn test_unregister_logs_once() {
        let sup = supervisor_with(
            Arc::new(FakePortInspector::new()),
            vec![config("api", Some(5001), "python")],
        );
        assert!(sup.unregister("api"));
        assert!(!sup.unregister("api"));
        assert_eq!(sup.events(10, Some("api")).len(), 1);
    }

    #[test]
    fn test_status_tracks_port_table() {
        let inspector = Arc::new(FakePortInspector::new());
        let sup = supervisor_with(inspector.clone(), vec![config("api", Some(5001), "python")]);

        assert_eq!(sup.status("api").unwrap(), ServiceStatus::Stopped);
        inspector.occupy(5001, 4242, "python3");
        assert_eq!(sup.status("api").unwrap(), ServiceStatus::Running);
        let service = sup.service("api").unwrap();
        assert_eq!(service.pid, Some(4242));
        assert!(service.last_check.is_some());
    }

    #[test]
    fn test_status_unknown_service() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        assert!(matches!(
            sup.status("ghost"),
            Err(SupervisorError::UnknownService(_))
        ));
    }

    #[test]
    fn test_shared_port_reports_conflict_not_crash() {
        let inspector = Arc::new(FakePortInspector::new());
        inspector.occupy(9000, 100, "postgres");
        let sup = supervisor_with(
            inspector,
            vec![config("db", Some(9000), "postgres"), config("queue", Some(9000), "redis")],
        );

        let statuses = sup.check_all();
        assert_eq!(statuses["db"], ServiceStatus::Running);
        assert_eq!(statuses["queue"], ServiceStatus::PortConflict);

        let conflicts = sup.get_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].service, "queue");
        assert_eq!(conflicts[0].occupant.as_ref().unwrap().process_name, "postgres");
    }

    #[test]
    fn test_operation_events_and_summary() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        sup.start_operation("pull-1", "model_pull", "llama3", Some(1000), None).unwrap();
        sup.update_operation(
            "pull-1",
            OperationUpdate {
                resource_impact: Some(ResourceImpact {
                    cpu_percent: Some(85.0),
                    memory_mb: None,
                    network_mbps: Some(40.0),
                }),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(sup.operations_summary().overload_risk);
        let warning = sup.should_warn_before_operation();
        assert!(warning.warn);
        assert!(!warning.reasons.is_empty());

        sup.complete_operation("pull-1", Some("cancelled".into())).unwrap();
        assert!(!sup.operations_summary().overload_risk);
        assert!(matches!(
            sup.complete_operation("pull-1", None),
            Err(SupervisorError::OperationFinished(_))
        ));

        let kinds: Vec<EventType> = sup.events(10, Some("pull-1")).iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![EventType::OperationStarted, EventType::OperationCancelled]);
    }

    #[test]
    fn test_final_status_update_finishes_like_complete() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        sup.start_operation("pull-2", "model_pull", "mistral", Some(400), Some(77)).unwrap();

        let op = sup
            .update_operation(
                "pull-2",
                OperationUpdate {
                    downloaded: Some(100),
                    status: Some(OperationStatus::Completed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.progress, 100.0);
        assert_eq!(op.downloaded, 400);

        let last = sup.events(1, Some("pull-2")).pop().unwrap();
        assert_eq!(last.event_type, EventType::OperationCompleted);
        assert_eq!(last.pid, Some(77));

        sup.start_operation("pull-3", "model_pull", "", None, None).unwrap();
        let op = sup
            .update_operation(
                "pull-3",
                OperationUpdate {
                    status: Some(OperationStatus::Failed),
                    error: Some("checksum mismatch".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        let last = sup.events(1, Some("pull-3")).pop().unwrap();
        assert_eq!(last.event_type, EventType::OperationFailed);
        assert_eq!(last.details, "checksum mismatch");
    }

    #[test]
    fn test_operation_lookup() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        assert!(matches!(sup.operation("ghost"), Err(SupervisorError::UnknownOperation(_))));
        assert!(matches!(
            sup.update_operation("ghost", OperationUpdate::default()),
            Err(SupervisorError::UnknownOperation(_))
        ));
        sup.start_operation("seed", "seed", "", None, None).unwrap();
        assert_eq!(sup.operation("seed").unwrap().operation.id, "seed");
    }

    #[test]
    fn test_concurrent_registrations_all_land() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        let handles: Vec<_> = (0..8u16)
            .map(|i| {
                let sup = sup.clone();
                std::thread::spawn(move || {
                    let name = format!("svc-{}", i);
                    sup.register(ServiceRegistration::new(&name, Some(6000 + i), "")).unwrap();
                    sup.status(&name).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), ServiceStatus::Stopped);
        }
        assert_eq!(sup.services().len(), 8);
        assert_eq!(sup.events(100, None).len(), 8);
    }

    #[test]
    fn test_dashboard_groups_services() {
        let inspector = Arc::new(FakePortInspector::new());
        inspector.occupy(5001, 10, "python");
        inspector.occupy(3000, 11, "nginx");
        let sup = supervisor_with(
            inspector,
            vec![
                config("api", Some(5001), "python"),
                config("ui", Some(3000), "node"),
                config("docs", Some(8080), "python"),
                config("worker", None, "worker"),
            ],
        );
        sup.start_operation("seed", "seed", "bulk seed", None, None).unwrap();

        let summary = sup.dashboard_summary();
        assert_eq!(summary.totals.services, 4);
        assert_eq!(summary.totals.running, 1);
        assert_eq!(summary.totals.stopped, 1);
        assert_eq!(summary.totals.conflicts, 1);
        assert_eq!(summary.totals.active_operations, 1);
        assert_eq!(summary.services_by_status[&ServiceStatus::Unknown][0].name(), "worker");
        assert_eq!(summary.conflicts[0].service, "ui");
        assert_eq!(summary.resources.running_services, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["services_by_status"]["port_conflict"].is_array());
    }

    #[test]
    fn test_tick_records_counts() {
        let inspector = Arc::new(FakePortInspector::new());
        inspector.occupy(5001, 10, "python");
        let sup = supervisor_with(inspector, vec![config("api", Some(5001), "python")]);
        sup.check_all();
        let snap = sup.tick();
        assert_eq!(snap.running_services, 1);
        assert_eq!(snap.managed_processes, 0);
    }

    #[test]
    fn test_monitor_fills_history() {
        let sup = supervisor_with(Arc::new(FakePortInspector::new()), vec![]);
        assert!(sup.start_monitor(Duration::from_millis(20)));
        assert!(!sup.start_monitor(Duration::from_millis(20)));
        std::thread::sleep(Duration::from_millis(200));
        assert!(sup.stop_monitor());
        assert!(!sup.history(5).is_empty());
    }
}
