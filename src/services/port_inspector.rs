use crate::error::{Result, SupervisorError};
use crate::models::PortOccupant;
use crate::services::process_checker;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::process::Command;
use std::time::Duration;

/// Read-only view of local TCP ports. Implementations hold no mutable state.
pub trait PortInspector: Send + Sync {
    /// Whether nothing accepts connections on `port`.
    fn is_port_free(&self, port: u16) -> bool;

    /// Every process listening on `port`. Empty when nothing is found or the lookup fails.
    fn find_occupants(&self, port: u16) -> Vec<PortOccupant>;

    fn find_occupant(&self, port: u16) -> Option<PortOccupant> {
        self.find_occupants(port).into_iter().next()
    }
}

/// Probes with a TCP connect and resolves owners with `lsof`.
pub struct SystemPortInspector {
    connect_timeout: Duration,
}

impl SystemPortInspector {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
        }
    }
}

impl Default for SystemPortInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl PortInspector for SystemPortInspector {
    fn is_port_free(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, self.connect_timeout).is_err()
    }

    fn find_occupants(&self, port: u16) -> Vec<PortOccupant> {
        let output = Command::new("lsof")
            .arg("-nP")
            .arg("-t")
            .arg(format!("-iTCP:{}", port))
            .arg("-sTCP:LISTEN")
            .output();

        let stdout = match output {
            Ok(out) if out.status.success() => out.stdout,
            Ok(_) => return Vec::new(),
            Err(e) => {
                log::debug!("lsof unavailable for port {}: {}", port, e);
                return Vec::new();
            }
        };

        let mut pids: Vec<u32> = String::from_utf8_lossy(&stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .collect();
        pids.sort_unstable();
        pids.dedup();

        pids.into_iter()
            .map(|pid| PortOccupant {
                pid,
                process_name: process_checker::process_name(pid)
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect()
    }
}

/// First free port at or above `start`.
pub fn find_available_port(inspector: &dyn PortInspector, start: u16) -> Result<u16> {
    (start..=u16::MAX)
        .find(|&port| port != 0 && inspector.is_port_free(port))
        .ok_or(SupervisorError::NoAvailablePort(start))
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::services::process_checker::is_pid_alive;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory port table for tests.
    #[derive(Default)]
    pub struct FakePortInspector {
        /// port -> occupants; an entry with no occupants means "taken by someone unknown"
        ports: Mutex<HashMap<u16, Vec<PortOccupant>>>,
        /// ports released once all their occupants have exited
        linked: Mutex<HashSet<u16>>,
    }

    impl FakePortInspector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn occupy(&self, port: u16, pid: u32, name: &str) {
            self.ports.lock().unwrap().entry(port).or_default().push(PortOccupant {
                pid,
                process_name: name.to_string(),
            });
        }

        pub fn occupy_anonymously(&self, port: u16) {
            self.ports.lock().unwrap().entry(port).or_default();
        }

        /// Occupy `port` with a real process; the port frees itself when it exits.
        pub fn occupy_by_process(&self, port: u16, pid: u32, name: &str) {
            self.occupy(port, pid, name);
            self.linked.lock().unwrap().insert(port);
        }

        fn vacate_exited(&self) {
            let linked = self.linked.lock().unwrap();
            let mut ports = self.ports.lock().unwrap();
            ports.retain(|port, occupants| {
                !linked.contains(port) || occupants.iter().any(|o| is_pid_alive(o.pid))
            });
        }
    }

    impl PortInspector for FakePortInspector {
        fn is_port_free(&self, port: u16) -> bool {
            self.vacate_exited();
            !self.ports.lock().unwrap().contains_key(&port)
        }

        fn find_occupants(&self, port: u16) -> Vec<PortOccupant> {
            self.vacate_exited();
            self.ports.lock().unwrap().get(&port).cloned().unwrap_or_default()
        }
    }
}
