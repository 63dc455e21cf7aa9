use crate::models::ResourceSnapshot;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// One sample per minute for an hour.
pub const DEFAULT_HISTORY_LEN: usize = 60;

/// Background loop that samples host resources into a bounded history.
///
/// `stop` only lowers a flag; the loop notices on its next wake, so stopping takes at most
/// one interval. A generation counter keeps a stop-then-start from leaving two loops alive.
pub struct ResourceMonitor {
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    history: Arc<Mutex<VecDeque<ResourceSnapshot>>>,
    capacity: usize,
}

impl ResourceMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            history: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Launch the loop. Returns `false` (and does nothing) if it is already running.
    ///
    /// `tick` produces each snapshot; returning `None` ends the loop.
    pub fn start<F>(&self, interval: Duration, tick: F) -> bool
    where
        F: Fn() -> Option<ResourceSnapshot> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let running = Arc::clone(&self.running);
        let current = Arc::clone(&self.generation);
        let history = Arc::clone(&self.history);
        let capacity = self.capacity;

        let spawned = thread::Builder::new()
            .name("resource-monitor".to_string())
            .spawn(move || {
                log::info!("resource monitor started (interval {}s)", interval.as_secs_f64());
                loop {
                    thread::sleep(interval);
                    if !running.load(Ordering::SeqCst)
                        || current.load(Ordering::SeqCst) != generation
                    {
                        break;
                    }
                    let Some(snapshot) = tick() else {
                        running.store(false, Ordering::SeqCst);
                        break;
                    };
                    log::debug!(
                        "resource tick: cpu {:.1}% mem {:.1}%",
                        snapshot.cpu_percent,
                        snapshot.memory_percent
                    );
                    push_bounded(&history, snapshot, capacity);
                }
                log::info!("resource monitor stopped");
            });

        if let Err(e) = spawned {
            log::error!("failed to spawn resource monitor: {}", e);
            self.running.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Ask the loop to exit at its next wake.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Append a snapshot taken outside the loop.
    pub fn record(&self, snapshot: ResourceSnapshot) {
        push_bounded(&self.history, snapshot, self.capacity);
    }

    /// Snapshots newer than `minutes` ago, oldest first.
    pub fn history(&self, minutes: u32) -> Vec<ResourceSnapshot> {
        let cutoff = Utc::now() - ChronoDuration::minutes(i64::from(minutes));
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.timestamp > cutoff)
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<ResourceSnapshot> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }
}

fn push_bounded(
    history: &Mutex<VecDeque<ResourceSnapshot>>,
    snapshot: ResourceSnapshot,
    capacity: usize,
) {
    let mut history = history.lock().unwrap_or_else(PoisonError::into_inner);
    history.push_back(snapshot);
    while history.len() > capacity {
        history.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn snapshot_minutes_ago(minutes: i64) -> ResourceSnapshot {
        let mut snap = ResourceSnapshot::zeroed();
        snap.timestamp = Utc::now() - ChronoDuration::minutes(minutes);
        snap
    }

    #[test]
    fn test_history_is_bounded() {
        let monitor = ResourceMonitor::new(3);
        for i in 0..5 {
            let mut snap = ResourceSnapshot::zeroed();
            snap.cpu_percent = i as f32;
            monitor.record(snap);
        }
        let history = monitor.history(60);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].cpu_percent, 2.0);
        assert_eq!(monitor.latest().unwrap().cpu_percent, 4.0);
    }

    #[test]
    fn test_history_filters_by_age() {
        let monitor = ResourceMonitor::new(10);
        monitor.record(snapshot_minutes_ago(90));
        monitor.record(snapshot_minutes_ago(30));
        monitor.record(snapshot_minutes_ago(5));

        assert_eq!(monitor.history(60).len(), 2);
        assert_eq!(monitor.history(10).len(), 1);
        assert_eq!(monitor.history(120).len(), 3);
    }

    #[test]
    fn test_loop_ticks_and_stops() {
        let monitor = ResourceMonitor::new(100);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        assert!(monitor.start(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(ResourceSnapshot::zeroed())
        }));
        assert!(monitor.is_running());

        thread::sleep(Duration::from_millis(200));
        assert!(monitor.stop());
        thread::sleep(Duration::from_millis(60));
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "only {after_stop} ticks");
        assert!(!monitor.history(60).is_empty());

        thread::sleep(Duration::from_millis(100));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_start_is_idempotent() {
        let monitor = ResourceMonitor::new(10);
        assert!(monitor.start(Duration::from_millis(50), || Some(ResourceSnapshot::zeroed())));
        assert!(!monitor.start(Duration::from_millis(50), || Some(ResourceSnapshot::zeroed())));
        assert!(monitor.stop());
        assert!(!monitor.stop());
    }

    #[test]
    fn test_tick_returning_none_ends_loop() {
        let monitor = ResourceMonitor::new(10);
        monitor.start(Duration::from_millis(10), || None);
        thread::sleep(Duration::from_millis(100));
        assert!(!monitor.is_running());
    }
}
