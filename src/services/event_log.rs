use crate::models::ProcessEvent;
use anyhow::Context;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EVENT_CAP: usize = 1000;

/// Bounded audit trail of lifecycle events, rewritten to disk after every append.
pub struct EventLog {
    path: Option<PathBuf>,
    cap: usize,
    entries: VecDeque<ProcessEvent>,
}

impl EventLog {
    /// Log that never touches disk.
    pub fn in_memory(cap: usize) -> Self {
        Self {
            path: None,
            cap: cap.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Load from `path`. A missing or unreadable file yields an empty log.
    pub fn load(path: &Path, cap: usize) -> Self {
        let mut log = Self {
            path: Some(path.to_path_buf()),
            ..Self::in_memory(cap)
        };

        if !path.exists() {
            return log;
        }

        match read_events(path) {
            Ok(events) => {
                let skip = events.len().saturating_sub(log.cap);
                log.entries = events.into_iter().skip(skip).collect();
                log::info!("loaded {} event(s) from {}", log.len(), path.display());
            }
            Err(e) => {
                log::warn!("starting with an empty event log: {:#}", e);
            }
        }
        log
    }

    /// Append, evicting the oldest entry past the cap, then persist.
    pub fn append(&mut self, event: ProcessEvent) {
        log::debug!(
            "event [{}] {:?}: {}",
            event.service,
            event.event_type,
            event.details
        );
        self.entries.push_back(event);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
        if let Err(e) = self.save() {
            log::error!("failed to persist event log: {:#}", e);
        }
    }

    /// The newest `limit` events, oldest first, optionally for one service only.
    pub fn recent(&self, limit: usize, service: Option<&str>) -> Vec<ProcessEvent> {
        let mut matching: Vec<ProcessEvent> = self
            .entries
            .iter()
            .rev()
            .filter(|e| service.map_or(true, |s| e.service == s))
            .take(limit)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomically(path, json.as_bytes())
    }
}

fn read_events(path: &Path) -> anyhow::Result<Vec<ProcessEvent>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let events = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(events)
}

/// Write through a sibling temp file and rename over the target.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
