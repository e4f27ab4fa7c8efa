//! Performance monitoring and memory tracking.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// RSS sampling interval.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
/// Log a warning above this resident set size.
const MEMORY_WARN_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: String,
    pub duration_ms: u64,
}

/// Append-only per-stage timing log, internally synchronized.
pub struct PerformanceMonitor {
    timings: Mutex<Vec<StageTiming>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            timings: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, stage: impl Into<String>, duration_ms: u64) {
        let stage = stage.into();
        debug!("Stage {} took {} ms", stage, duration_ms);
        self.timings.lock().push(StageTiming { stage, duration_ms });
    }

    pub fn timings(&self) -> Vec<StageTiming> {
        self.timings.lock().clone()
    }

    pub fn total_ms(&self) -> u64 {
        self.timings.lock().iter().map(|t| t.duration_ms).sum()
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples resident memory every five seconds and warns above 1 GiB.
/// The task ends when the returned handle is dropped via abort or the
/// runtime shuts down.
pub fn spawn_memory_tracker() -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {
        let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            interval.tick().await;
            if let Some(rss) = resident_set_bytes() {
                if rss > MEMORY_WARN_BYTES {
                    warn!("Resident memory at {} MiB", rss / (1024 * 1024));
                } else {
                    debug!("Resident memory at {} MiB", rss / (1024 * 1024));
                }
            }
        }
    })
}

/// Resident set size from /proc on Linux; None elsewhere.
#[cfg(target_os = "linux")]
fn resident_set_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn resident_set_bytes() -> Option<u64> {
    None
}
