use crate::error::{Result, SupervisorError};
use crate::models::{
    Environment, PortConflict, ProcessState, Service, ServiceConfig, ServiceRegistration,
    ServiceStatus,
};
use crate::services::event_log::write_atomically;
use crate::services::port_inspector::PortInspector;
use crate::services::process_checker::process_name_matches;
use anyhow::Context;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog of named services, persisted as a JSON array of `ServiceConfig`.
pub struct ServiceRegistry {
    path: Option<PathBuf>,
    services: BTreeMap<String, Service>,
}

/// Core services used when the registry file is missing or unreadable.
pub fn default_services() -> Vec<ServiceConfig> {
    let mut api = ServiceConfig::new("api", Some(5001), "python", "Control-plane API server");
    api.environment = Environment::Production;

    let mut ui = ServiceConfig::new("ui", Some(3000), "node", "Web dashboard");
    ui.environment = Environment::Production;

    let mut ollama = ServiceConfig::new("ollama", Some(11434), "ollama", "Local model runtime");
    ollama.environment = Environment::Production;
    ollama.start_command = Some("ollama serve".to_string());
    ollama.health_url = Some("http://127.0.0.1:11434/api/tags".to_string());

    vec![api, ui, ollama]
}

impl ServiceRegistry {
    pub fn in_memory(configs: Vec<ServiceConfig>) -> Self {
        let mut registry = Self {
            path: None,
            services: BTreeMap::new(),
        };
        registry.replace_all(configs);
        registry
    }

    /// Load from `path`, falling back to [`default_services`] on any failure.
    pub fn load(path: &Path) -> Self {
        let configs = if path.exists() {
            match read_configs(path) {
                Ok(configs) => {
                    log::info!("loaded {} service(s) from {}", configs.len(), path.display());
                    configs
                }
                Err(e) => {
                    log::warn!("using default services: {:#}", e);
                    default_services()
                }
            }
        } else {
            log::info!(
                "no registry at {}, starting with default services",
                path.display()
            );
            default_services()
        };

        let mut registry = Self::in_memory(configs);
        registry.path = Some(path.to_path_buf());
        registry
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let configs: Vec<&ServiceConfig> = self.services.values().map(|s| &s.config).collect();
        let json = serde_json::to_string_pretty(&configs)?;
        write_atomically(path, json.as_bytes())
    }

    /// Persist, logging instead of failing.
    pub fn persist(&self) {
        if let Err(e) = self.save() {
            log::error!("failed to persist service registry: {:#}", e);
        }
    }

    fn replace_all(&mut self, configs: Vec<ServiceConfig>) {
        self.services.clear();
        for config in configs {
            if self.services.contains_key(&config.name) {
                log::warn!("duplicate service '{}' in registry, keeping the last", config.name);
            }
            self.services.insert(config.name.clone(), Service::new(config));
        }
    }

    /// Upsert. Returns `true` when a new service was created.
    pub fn register(&mut self, reg: ServiceRegistration) -> Result<bool> {
        let name = reg.name.trim();
        if name.is_empty() {
            return Err(SupervisorError::InvalidRegistration(
                "service name must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.services.get_mut(name) {
            let config = &mut existing.config;
            config.port = reg.port;
            config.description = reg.description;
            config.start_command = reg.start_command;
            config.health_url = reg.health_url;
            if let Some(process_name) = reg.process_name {
                config.process_name = process_name;
            }
            if let Some(environment) = reg.environment {
                config.environment = environment;
            }
            if reg.stop_command.is_some() {
                config.stop_command = reg.stop_command;
            }
            if reg.working_dir.is_some() {
                config.working_dir = reg.working_dir;
            }
            return Ok(false);
        }

        let mut config = ServiceConfig::new(
            name,
            reg.port,
            reg.process_name.as_deref().unwrap_or(name),
            &reg.description,
        );
        config.environment = reg.environment.unwrap_or(Environment::Development);
        config.start_command = reg.start_command;
        config.stop_command = reg.stop_command;
        config.health_url = reg.health_url;
        config.working_dir = reg.working_dir;
        self.services.insert(name.to_string(), Service::new(config));
        Ok(true)
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.services.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn config(&self, name: &str) -> Result<ServiceConfig> {
        self.get(name)
            .map(|s| s.config.clone())
            .ok_or_else(|| SupervisorError::UnknownService(name.to_string()))
    }

    pub fn configs(&self) -> Vec<ServiceConfig> {
        self.services.values().map(|s| s.config.clone()).collect()
    }

    pub fn list(&self) -> Vec<Service> {
        self.services.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Record the outcome of a check.
    pub fn apply(&mut self, name: &str, observation: &Observation) {
        if let Some(service) = self.services.get_mut(name) {
            service.status = observation.status;
            service.pid = observation.pid;
            service.last_check = Some(Utc::now());
        }
    }

    pub fn set_status(&mut self, name: &str, status: ServiceStatus, pid: Option<u32>) {
        if let Some(service) = self.services.get_mut(name) {
            service.status = status;
            service.pid = pid;
        }
    }
}

fn read_configs(path: &Path) -> anyhow::Result<Vec<ServiceConfig>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let configs = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(configs)
}

/// What the supervisor knows about its own child for a service.
#[derive(Debug, Clone, Copy)]
pub struct ManagedHint {
    pub pid: u32,
    pub state: ProcessState,
    pub alive: bool,
}

/// Result of checking one service.
#[derive(Debug, Clone)]
pub struct Observation {
    pub status: ServiceStatus,
    pub pid: Option<u32>,
    pub conflict: Option<PortConflict>,
    /// The managed child for this service has exited
    pub managed_exited: bool,
}

impl Observation {
    fn new(status: ServiceStatus, pid: Option<u32>) -> Self {
        Self {
            status,
            pid,
            conflict: None,
            managed_exited: false,
        }
    }
}

/// Derive a service's status from the port table and its managed child, if any.
///
/// An occupied port whose owner cannot be identified is a conflict, never "running".
pub fn observe(
    config: &ServiceConfig,
    inspector: &dyn PortInspector,
    managed: Option<ManagedHint>,
) -> Observation {
    let exited = managed.map_or(false, |m| !m.alive);
    let live = managed.filter(|m| m.alive);

    // without a port only our own child says anything; otherwise unknown
    let Some(port) = config.port else {
        let mut obs = match live {
            Some(m) => Observation::new(ServiceStatus::Running, Some(m.pid)),
            None if exited => Observation::new(ServiceStatus::Failed, None),
            None => Observation::new(ServiceStatus::Unknown, None),
        };
        obs.managed_exited = exited;
        return obs;
    };

    if inspector.is_port_free(port) {
        let mut obs = match live {
            Some(m) if m.state == ProcessState::Starting => {
                Observation::new(ServiceStatus::Starting, Some(m.pid))
            }
            None if exited => Observation::new(ServiceStatus::Failed, None),
            _ => Observation::new(ServiceStatus::Stopped, None),
        };
        obs.managed_exited = exited;
        return obs;
    }

    let occupants = inspector.find_occupants(port);
    if let Some(owner) = occupants
        .iter()
        .find(|o| process_name_matches(&config.process_name, &o.process_name))
    {
        let mut obs = Observation::new(ServiceStatus::Running, Some(owner.pid));
        obs.managed_exited = exited;
        return obs;
    }

    let occupant = occupants.into_iter().next();
    let mut obs = Observation::new(ServiceStatus::PortConflict, occupant.as_ref().map(|o| o.pid));
    obs.conflict = Some(PortConflict {
        service: config.name.clone(),
        port,
        expected: config.process_name.clone(),
        occupant,
    });
    obs.managed_exited = exited;
    obs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::port_inspector::testing::FakePortInspector;

    fn reg(name: &str, port: Option<u16>, description: &str) -> ServiceRegistration {
        ServiceRegistration::new(name, port, description)
    }

    #[test]
    fn test_register_creates_development_service() {
        let mut registry = ServiceRegistry::in_memory(vec![]);
        assert!(registry.register(reg("api", Some(5001), "API")).unwrap());

        let service = registry.get("api").unwrap();
        assert_eq!(service.config.environment, Environment::Development);
        assert!(service.config.enabled);
        assert_eq!(service.config.process_name, "api");
        assert_eq!(service.status, ServiceStatus::Unknown);
    }

    #[test]
    fn test_register_twice_updates_in_place() {
        let mut registry = ServiceRegistry::in_memory(vec![]);
        registry.register(reg("api", Some(5001), "old")).unwrap();
        let mut update = reg("api", Some(5002), "new");
        update.start_command = Some("python app.py".into());
        assert!(!registry.register(update).unwrap());

        assert_eq!(registry.len(), 1);
        let config = &registry.get("api").unwrap().config;
        assert_eq!(config.port, Some(5002));
        assert_eq!(config.description, "new");
        assert_eq!(config.start_command.as_deref(), Some("python app.py"));
    }

    #[test]
    fn test_unregister_then_register_matches_direct_update() {
        let mut direct = ServiceRegistry::in_memory(vec![]);
        direct.register(reg("api", Some(5001), "old")).unwrap();
        direct.register(reg("api", Some(6000), "new")).unwrap();

        let mut cycled = ServiceRegistry::in_memory(vec![]);
        cycled.register(reg("api", Some(5001), "old")).unwrap();
        assert!(cycled.unregister("api"));
        cycled.register(reg("api", Some(6000), "new")).unwrap();

        assert_eq!(direct.configs(), cycled.configs());
        assert_eq!(cycled.len(), 1);
    }

    #[test]
    fn test_unregister_missing_is_false() {
        let mut registry = ServiceRegistry::in_memory(vec![]);
        assert!(!registry.unregister("ghost"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = ServiceRegistry::in_memory(vec![]);
        assert!(matches!(
            registry.register(reg("  ", None, "")),
            Err(SupervisorError::InvalidRegistration(_))
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ServiceRegistry::load(&dir.path().join("services.json"));
        assert_eq!(registry.len(), default_services().len());
        assert!(registry.get("api").is_some());
    }

    #[test]
    fn test_load_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        fs::write(&path, "[{\"name\": ").unwrap();
        let registry = ServiceRegistry::load(&path);
        assert_eq!(registry.len(), default_services().len());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        let mut registry = ServiceRegistry::load(&path);
        let mut worker = reg("worker", None, "Queue worker");
        worker.stop_command = Some("pkill -f worker.py".into());
        registry.register(worker).unwrap();
        registry.unregister("ui");
        registry.save().unwrap();

        let reloaded = ServiceRegistry::load(&path);
        assert_eq!(reloaded.configs(), registry.configs());
        assert!(reloaded.get("ui").is_none());
    }

    fn config(name: &str, port: Option<u16>, process: &str) -> ServiceConfig {
        ServiceConfig::new(name, port, process, "")
    }

    #[test]
    fn test_observe_without_port_is_unknown() {
        let inspector = FakePortInspector::new();
        let obs = observe(&config("worker", None, "worker"), &inspector, None);
        assert_eq!(obs.status, ServiceStatus::Unknown);
    }

    #[test]
    fn test_observe_free_port_is_stopped() {
        let inspector = FakePortInspector::new();
        let obs = observe(&config("api", Some(5001), "python"), &inspector, None);
        assert_eq!(obs.status, ServiceStatus::Stopped);
        assert!(obs.conflict.is_none());
    }

    #[test]
    fn test_observe_matching_occupant_is_running() {
        let inspector = FakePortInspector::new();
        inspector.occupy(5001, 777, "python3");
        let obs = observe(&config("api", Some(5001), "python"), &inspector, None);
        assert_eq!(obs.status, ServiceStatus::Running);
        assert_eq!(obs.pid, Some(777));
    }

    #[test]
    fn test_observe_mismatched_occupant_is_conflict() {
        let inspector = FakePortInspector::new();
        inspector.occupy(5001, 888, "node");
        let obs = observe(&config("api", Some(5001), "python"), &inspector, None);
        assert_eq!(obs.status, ServiceStatus::PortConflict);
        let conflict = obs.conflict.unwrap();
        assert_eq!(conflict.occupant.unwrap().process_name, "node");
    }

    #[test]
    fn test_observe_unidentified_occupant_is_conflict() {
        let inspector = FakePortInspector::new();
        inspector.occupy_anonymously(5001);
        let obs = observe(&config("api", Some(5001), "python"), &inspector, None);
        assert_eq!(obs.status, ServiceStatus::PortConflict);
        assert!(obs.conflict.unwrap().occupant.is_none());
    }

    #[test]
    fn test_observe_starting_child_with_free_port() {
        let inspector = FakePortInspector::new();
        let hint = ManagedHint {
            pid: 55,
            state: ProcessState::Starting,
            alive: true,
        };
        let obs = observe(&config("wizard", Some(5002), "python"), &inspector, Some(hint));
        assert_eq!(obs.status, ServiceStatus::Starting);
        assert_eq!(obs.pid, Some(55));
    }

    #[test]
    fn test_observe_exited_child_is_failed() {
        let inspector = FakePortInspector::new();
        let hint = ManagedHint {
            pid: 55,
            state: ProcessState::Running,
            alive: false,
        };
        let obs = observe(&config("wizard", Some(5002), "python"), &inspector, Some(hint));
        assert_eq!(obs.status, ServiceStatus::Failed);
        assert!(obs.managed_exited);
    }
}
