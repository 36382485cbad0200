use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

/// Shared slicing progress. Cloning gives another handle to the same
/// counters, so a worker can update it while other threads poll or wait.
#[derive(Clone)]
pub struct Progress(Arc<ProgressInner>);

struct ProgressInner {
    completed: AtomicU32,
    total: AtomicU32,
    finished: AtomicBool,

    notify: Condvar,
    lock: Mutex<()>,
}

impl Progress {
    pub fn new() -> Self {
        Self(Arc::new(ProgressInner {
            completed: AtomicU32::new(0),
            total: AtomicU32::new(0),
            finished: AtomicBool::new(false),

            notify: Condvar::new(),
            lock: Mutex::new(()),
        }))
    }

    /// Fraction of completed work, 0 if the total is not known yet.
    pub fn progress(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        self.completed() as f32 / total as f32
    }

    pub fn completed(&self) -> u32 {
        self.0.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u32 {
        self.0.total.load(Ordering::Relaxed)
    }

    /// True once the producer stopped, either because all the work is done
    /// or because it was cancelled.
    pub fn is_finished(&self) -> bool {
        self.0.finished.load(Ordering::Acquire)
    }

    pub fn set_total(&self, total: u32) {
        self.0.total.store(total, Ordering::Relaxed);
    }

    pub fn set_completed(&self, completed: u32) {
        self.0.completed.store(completed, Ordering::Relaxed);
        self.0.notify.notify_all();
    }

    pub fn set_finished(&self) {
        self.0.finished.store(true, Ordering::Release);
        self.0.notify.notify_all();
    }

    /// Blocks until the producer reports more work or finishes, returning
    /// the completed count. Wakes up periodically so a missed notification
    /// can't stall the caller.
    pub fn wait(&self) -> u32 {
        let mut guard = self.0.lock.lock();
        if !self.is_finished() {
            self.0
                .notify
                .wait_for(&mut guard, Duration::from_millis(100));
        }

        self.completed()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
