use crate::models::{ProcessSample, ResourceSnapshot};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use sysinfo::{Disks, Pid, ProcessStatus, ProcessesToUpdate, System};

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One-shot host readings. Keeps a `System` between calls so CPU deltas are meaningful.
pub struct ResourceSnapshotter {
    system: Mutex<System>,
}

impl ResourceSnapshotter {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }

    /// Current CPU, memory and root-disk usage. Returns a zeroed snapshot if the reading fails.
    pub fn snapshot(&self) -> ResourceSnapshot {
        let mut sys = match self.system.lock() {
            Ok(sys) => sys,
            Err(_) => {
                log::warn!("resource snapshot skipped: system handle poisoned");
                return ResourceSnapshot::zeroed();
            }
        };

        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let total = sys.total_memory() as f64;
        let used = sys.used_memory() as f64;
        let available = sys.available_memory() as f64;
        let (disk_used, disk_free) = root_disk_usage();

        ResourceSnapshot {
            timestamp: Utc::now(),
            cpu_percent: sys.global_cpu_usage(),
            memory_used_mb: used / MB,
            memory_available_mb: available / MB,
            memory_percent: if total > 0.0 {
                (used / total * 100.0) as f32
            } else {
                0.0
            },
            disk_used_gb: disk_used as f64 / GB,
            disk_free_gb: disk_free as f64 / GB,
            managed_processes: 0,
            running_services: 0,
        }
    }

    /// CPU and memory of each pid that is still alive. Missing pids are absent from the map.
    pub fn sample_processes(&self, pids: &[u32]) -> HashMap<u32, ProcessSample> {
        let mut samples = HashMap::new();
        if pids.is_empty() {
            return samples;
        }
        let Ok(mut sys) = self.system.lock() else {
            return samples;
        };

        let targets: Vec<Pid> = pids.iter().map(|&p| Pid::from_u32(p)).collect();
        sys.refresh_processes(ProcessesToUpdate::Some(&targets), true);

        for &pid in pids {
            if let Some(process) = sys.process(Pid::from_u32(pid)) {
                if process.status() == ProcessStatus::Zombie {
                    continue;
                }
                samples.insert(
                    pid,
                    ProcessSample {
                        cpu_percent: process.cpu_usage(),
                        memory_mb: process.memory() as f64 / MB,
                    },
                );
            }
        }
        samples
    }
}

impl Default for ResourceSnapshotter {
    fn default() -> Self {
        Self::new()
    }
}

/// (used, free) bytes on the volume mounted at `/`, or the first disk when there is none.
fn root_disk_usage() -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());

    match disk {
        Some(d) => (
            d.total_space().saturating_sub(d.available_space()),
            d.available_space(),
        ),
        None => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reports_memory() {
        let snapshotter = ResourceSnapshotter::new();
        let snap = snapshotter.snapshot();
        assert!(snap.is_valid());
        assert!((0.0..=100.0).contains(&snap.memory_percent));
        assert!(snap.cpu_percent >= 0.0);
    }

    #[test]
    fn test_sample_skips_dead_pids() {
        let snapshotter = ResourceSnapshotter::new();
        let own = std::process::id();
        let samples = snapshotter.sample_processes(&[own, 4_194_304 + 17]);
        assert!(samples.contains_key(&own));
        assert!(!samples.contains_key(&(4_194_304 + 17)));
        assert!(samples[&own].memory_mb > 0.0);
    }
}
