//! # Background Cleaner
//!
//! Evicts expired keys eagerly: a dedicated thread wakes every sweep
//! interval, pops due records from the expiry index, and deletes each key
//! under a briefly-held exclusive keyspace lock. The expiry lock is taken
//! first, matching the order used by the command handlers.
//!
//! `sweep_expired` takes the clock as a parameter so tests can advance time
//! without sleeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::cache::Cache;

/// Default period between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(50);

/// Handle for the background sweeper thread.
///
/// Call `stop` to signal shutdown and join the thread.
pub struct CleanerHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl CleanerHandle {
    /// Stops the sweeper and waits for the thread to finish.
    ///
    /// Use this in tests or shutdown hooks to avoid leaking threads.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Cache {
    /// Removes every entry whose deadline is at or before `now`.
    ///
    /// A record may outlive its key (the key was deleted or overwritten
    /// through another path); popping it is then a no-op on the keyspace.
    pub fn sweep_expired(&self, now: SystemTime) -> usize {
        let mut exps = self.exps.lock();
        let mut removed = 0;
        while let Some(record) = exps.pop_due(now) {
            self.fields.write().remove(&record.key);
            removed += 1;
        }
        removed
    }

    /// Starts a background thread that sweeps expired keys every `interval`.
    ///
    /// The returned handle must be stopped to avoid leaking the thread.
    pub fn start_cleaner(self: &Arc<Self>, interval: Duration) -> CleanerHandle {
        let interval = if interval.is_zero() {
            Duration::from_millis(1)
        } else {
            interval
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let cache = Arc::clone(self);

        let join = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::Acquire) {
                std::thread::sleep(interval);
                let removed = cache.sweep_expired(SystemTime::now());
                if removed > 0 {
                    debug!(removed, "swept expired keys");
                }
            }
        });

        CleanerHandle {
            stop,
            join: Some(join),
        }
    }
}
