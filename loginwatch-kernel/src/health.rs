use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchHealth {
    pub uptime_seconds: u64,
    pub hosts_tracked: u32,
    pub cycles_run: u64,
    pub last_cycle_at: Option<i64>,
    pub last_cycle_ms: Option<u64>,
    pub last_cycle_dirty: u32,
    pub last_cycle_probe_failures: u32,
}

#[derive(Debug, Clone, Copy)]
struct LastCycle {
    at: i64,
    elapsed: Duration,
    dirty: u32,
    probe_failures: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    cycles: Arc<AtomicU64>,
    last: Arc<Mutex<Option<LastCycle>>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: Arc::new(AtomicU64::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_cycle(&self, at: i64, elapsed: Duration, dirty: usize, probe_failures: usize) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = Some(LastCycle {
            at,
            elapsed,
            dirty: dirty as u32,
            probe_failures: probe_failures as u32,
        });
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn get_health(&self, hosts_tracked: usize) -> WatchHealth {
        let last = *self.last.lock();
        WatchHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            hosts_tracked: hosts_tracked as u32,
            cycles_run: self.cycles_run(),
            last_cycle_at: last.map(|l| l.at),
            last_cycle_ms: last.map(|l| l.elapsed.as_millis() as u64),
            last_cycle_dirty: last.map_or(0, |l| l.dirty),
            last_cycle_probe_failures: last.map_or(0, |l| l.probe_failures),
        }
    }
}
