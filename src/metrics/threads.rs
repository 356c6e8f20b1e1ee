use parking_lot::Mutex;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe running min / mean / max of active-thread counts.
/// Worker threads call `record()`, the flusher calls `snapshot_and_reset()`.
#[derive(Debug, Default)]
pub struct ThreadStatAggregator {
    inner: Mutex<Window>,
}

/// Active-thread statistics for one flush window.
/// All-zero when nothing was recorded in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActiveThreadStats {
    pub min: u32,
    pub mean: f64,
    pub max: u32,
}

/// Window statistics plus the engine's instantaneous thread counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThreadCountSnapshot {
    pub active: ActiveThreadStats,
    pub started: u32,
    pub finished: u32,
}

// ─── Internal state ──────────────────────────────────────────────

/// Running totals for the current window. `Default` is the neutral state.
#[derive(Debug, Default)]
struct Window {
    count: u64,
    sum: u64,
    min: Option<u32>,
    max: u32,
}

// ─── ThreadStatAggregator impl ───────────────────────────────────

impl ThreadStatAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the active-thread count observed by one completed sample.
    pub fn record(&self, active_threads: u32) {
        let mut w = self.inner.lock();
        w.count += 1;
        w.sum += u64::from(active_threads);
        w.min = Some(w.min.map_or(active_threads, |m| m.min(active_threads)));
        w.max = w.max.max(active_threads);
    }

    /// Take the statistics gathered since the previous call and start a
    /// fresh window.
    pub fn snapshot_and_reset(&self) -> ActiveThreadStats {
        let w = std::mem::take(&mut *self.inner.lock());
        w.stats()
    }

    /// Samples recorded in the current window.
    #[cfg(test)]
    pub(crate) fn recorded(&self) -> u64 {
        self.inner.lock().count
    }
}

impl Window {
    fn stats(&self) -> ActiveThreadStats {
        if self.count == 0 {
            return ActiveThreadStats::default();
        }
        ActiveThreadStats {
            min: self.min.unwrap_or(0),
            mean: self.sum as f64 / self.count as f64,
            max: self.max,
        }
    }
}

impl ThreadCountSnapshot {
    pub fn new(active: ActiveThreadStats, started: u32, finished: u32) -> Self {
        Self {
            active,
            started,
            finished,
        }
    }
}
