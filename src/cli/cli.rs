use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::SupervisorSettings;

/// Local Supervisor - keeps local services on their ports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 9911)]
    pub port: u16,

    /// Listen address
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "127.0.0.1")]
    pub address: String,

    /// Directory holding services.json and events.json
    #[arg(short = 'd', long, env = "SUPERVISOR_DATA_DIR", default_value = ".supervisor")]
    pub data_dir: PathBuf,

    /// Seconds between resource monitor ticks
    #[arg(long, env = "MONITOR_INTERVAL_SECS", default_value_t = 60)]
    pub monitor_interval: u64,

    /// Resource snapshots kept in memory
    #[arg(long, env = "HISTORY_LEN", default_value_t = 60)]
    pub history_len: usize,

    /// Events kept in the event log
    #[arg(long, env = "EVENT_CAP", default_value_t = 1000)]
    pub event_cap: usize,

    /// Default readiness timeout for start, in seconds
    #[arg(long, env = "START_TIMEOUT_SECS", default_value_t = 30)]
    pub start_timeout: u64,

    /// Kill rounds before a port is reported as still occupied
    #[arg(long, env = "KILL_RETRIES", default_value_t = 3)]
    pub kill_retries: u32,

    /// Hard deadline for one API request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout: u64,
}

impl CommandArgs {
    pub fn settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            event_cap: self.event_cap.max(1),
            history_len: self.history_len.max(1),
            start_timeout: Duration::from_secs(self.start_timeout),
            kill_retries: self.kill_retries.max(1),
            ..SupervisorSettings::with_data_dir(&self.data_dir)
        }
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CommandArgs::try_parse_from(["local-supervisor"]).unwrap();
        assert_eq!(args.address, "127.0.0.1");
        let settings = args.settings();
        assert_eq!(settings.registry_path, Some(PathBuf::from(".supervisor/services.json")));
        assert_eq!(settings.events_path, Some(PathBuf::from(".supervisor/events.json")));
        assert_eq!(settings.kill_retries, 3);
        assert_eq!(args.monitor_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_flags_override() {
        let args = CommandArgs::try_parse_from([
            "local-supervisor",
            "--data-dir",
            "/tmp/sup",
            "--start-timeout",
            "5",
            "--kill-retries",
            "0",
        ])
        .unwrap();
        let settings = args.settings();
        assert_eq!(settings.start_timeout, Duration::from_secs(5));
        assert_eq!(settings.kill_retries, 1);
        assert_eq!(settings.registry_path, Some(PathBuf::from("/tmp/sup/services.json")));
    }
}
