use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deployment tier a service belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
    Experimental,
}

/// Observed state of a service. Always derived from the last check, never trusted between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Starting,
    Stopping,
    Stopped,
    Failed,
    PortConflict,
    #[default]
    Unknown,
}

/// Persisted service definition (one record in the registry file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unique service name
    pub name: String,
    /// Fixed TCP port, if the service binds one
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub environment: Environment,
    /// Name (or pattern) of the process expected to own the port
    pub process_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_command: Option<String>,
    #[serde(default)]
    pub stop_command: Option<String>,
    #[serde(default)]
    pub health_url: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ServiceConfig {
    pub fn new(name: &str, port: Option<u16>, process_name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            port,
            environment: Environment::Development,
            process_name: process_name.to_string(),
            description: description.to_string(),
            start_command: None,
            stop_command: None,
            health_url: None,
            working_dir: None,
            enabled: true,
        }
    }
}

/// A registered service together with its last observed state.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    #[serde(flatten)]
    pub config: ServiceConfig,
    pub status: ServiceStatus,
    /// Pid of the port occupant (or spawned child) seen at the last check
    pub pid: Option<u32>,
    pub last_check: Option<DateTime<Utc>>,
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            status: ServiceStatus::Unknown,
            pid: None,
            last_check: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Input for registering (or updating) a service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_command: Option<String>,
    #[serde(default)]
    pub health_url: Option<String>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub stop_command: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl ServiceRegistration {
    pub fn new(name: &str, port: Option<u16>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            port,
            description: description.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_when_fields_missing() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"name": "api", "process_name": "python"}"#).unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.enabled);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ServiceStatus::PortConflict).unwrap();
        assert_eq!(json, "\"port_conflict\"");
    }

    #[test]
    fn test_service_flattens_config() {
        let service = Service::new(ServiceConfig::new("api", Some(5001), "python", "API"));
        let value = serde_json::to_value(&service).unwrap();
        assert_eq!(value["name"], "api");
        assert_eq!(value["port"], 5001);
        assert_eq!(value["status"], "unknown");
    }
}
