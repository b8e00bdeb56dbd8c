//! # Delayed Action Scheduler
//!
//! Runs a fixed list of one-shot actions at offsets from the moment the
//! scheduler is started.
//!
//! ## Design
//!
//! - One dedicated, named worker thread per scheduler
//! - Actions are registered up front, then the scheduler is started once
//! - The worker waits for the next deadline on a shutdown channel, so
//!   teardown wakes it immediately instead of sleeping out the delay
//! - Actions run on the worker, never on the caller's thread
//!
//! Actions that have not fired when the handle is dropped never fire.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ScheduleError;

/// A one-shot action run by the scheduler worker.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

struct ScheduledAction {
    delay: Duration,
    action: Action,
}

/// Collects delayed actions before the worker is started.
pub struct DelayScheduler {
    name: String,
    entries: Vec<ScheduledAction>,
}

impl DelayScheduler {
    /// Create an empty scheduler. The name labels the worker thread and
    /// diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Register an action to run `delay` after [`start`](Self::start).
    ///
    /// Actions with equal delays run in registration order.
    pub fn schedule<F>(&mut self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.entries.push(ScheduledAction {
            delay,
            action: Box::new(action),
        });
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no action is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the worker and start the clock.
    pub fn start(self) -> Result<SchedulerHandle, ScheduleError> {
        let mut entries = self.entries;
        entries.sort_by_key(|e| e.delay);

        let total = entries.len();
        let fired = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (fired_tx, fired_rx) = unbounded::<usize>();
        let started_at = Instant::now();

        let worker = Worker {
            name: self.name.clone(),
            origin: started_at,
            shutdown: shutdown_rx,
            fired: fired.clone(),
            notify: fired_tx,
        };

        let thread = thread::Builder::new()
            .name(format!("perturb-{}", self.name))
            .spawn(move || worker.run(entries))?;

        debug!(scheduler = %self.name, actions = total, "scheduler started");

        Ok(SchedulerHandle {
            name: self.name,
            total,
            fired,
            fired_rx,
            started_at,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }
}

struct Worker {
    name: String,
    origin: Instant,
    shutdown: Receiver<()>,
    fired: Arc<AtomicUsize>,
    notify: Sender<usize>,
}

impl Worker {
    fn run(self, entries: Vec<ScheduledAction>) {
        for entry in entries {
            // A deadline past the end of the clock never arrives.
            let Some(deadline) = self.origin.checked_add(entry.delay) else {
                let _ = self.shutdown.recv();
                self.stopped();
                return;
            };

            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                match self.shutdown.recv_timeout(deadline - now) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        self.stopped();
                        return;
                    }
                }
            }

            (entry.action)();
            let count = self.fired.fetch_add(1, Ordering::AcqRel) + 1;
            trace!(scheduler = %self.name, delay = ?entry.delay, count, "action fired");
            let _ = self.notify.send(count);
        }

        debug!(scheduler = %self.name, "all actions fired");
    }

    fn stopped(&self) {
        debug!(
            scheduler = %self.name,
            fired = self.fired.load(Ordering::Acquire),
            "scheduler stopped before all actions fired"
        );
    }
}

/// Handle to a running scheduler.
///
/// Dropping the handle stops the worker and joins it.
pub struct SchedulerHandle {
    name: String,
    total: usize,
    fired: Arc<AtomicUsize>,
    fired_rx: Receiver<usize>,
    started_at: Instant,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerHandle {
    /// Scheduler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of actions that have run.
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::Acquire)
    }

    /// Number of actions still waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.total - self.fired()
    }

    /// Whether every registered action has run.
    pub fn is_complete(&self) -> bool {
        self.fired() == self.total
    }

    /// Time since the scheduler was started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Block until at least `count` actions have fired or `timeout` elapses.
    ///
    /// Returns whether the count was reached.
    pub fn wait_fired(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.fired() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.fired_rx.recv_timeout(deadline - now) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return self.fired() >= count,
                Err(RecvTimeoutError::Disconnected) => return self.fired() >= count,
            }
        }
        true
    }

    /// Stop the worker. Actions that have not fired yet are discarded.
    pub fn shutdown(&self) {
        // Dropping the sender disconnects the worker's wait.
        drop(self.shutdown_tx.lock().take());
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                debug!(scheduler = %self.name, "scheduler worker panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("name", &self.name)
            .field("total", &self.total)
            .field("fired", &self.fired())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn test_actions_fire_in_delay_order() {
        let log = Arc::new(PlMutex::new(Vec::new()));
        let mut scheduler = DelayScheduler::new("order");

        for (delay, tag) in [(30, 3), (10, 1), (20, 2)] {
            let log = log.clone();
            scheduler.schedule(Duration::from_millis(delay), move || log.lock().push(tag));
        }

        let handle = scheduler.start().unwrap();
        assert!(handle.wait_fired(3, Duration::from_secs(5)));
        assert!(handle.is_complete());
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_action_not_early() {
        let fired_at = Arc::new(PlMutex::new(None));
        let slot = fired_at.clone();
        let mut scheduler = DelayScheduler::new("late");
        let delay = Duration::from_millis(50);
        scheduler.schedule(delay, move || *slot.lock() = Some(Instant::now()));

        let start = Instant::now();
        let handle = scheduler.start().unwrap();
        assert!(handle.wait_fired(1, Duration::from_secs(5)));

        let at = fired_at.lock().unwrap();
        assert!(at.duration_since(start) >= delay);
    }

    #[test]
    fn test_each_action_fires_once() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut scheduler = DelayScheduler::new("once");
        for _ in 0..4 {
            let c = counter.clone();
            scheduler.schedule(Duration::ZERO, move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        let handle = scheduler.start().unwrap();
        assert!(handle.wait_fired(4, Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(handle.pending(), 0);
    }

    #[test]
    fn test_shutdown_discards_pending() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut scheduler = DelayScheduler::new("teardown");
        let c = counter.clone();
        scheduler.schedule(Duration::from_secs(3600), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let handle = scheduler.start().unwrap();
        assert_eq!(handle.pending(), 1);

        let start = Instant::now();
        handle.shutdown();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!handle.is_complete());
    }

    #[test]
    fn test_wait_fired_times_out() {
        let mut scheduler = DelayScheduler::new("slow");
        scheduler.schedule(Duration::from_secs(3600), || {});
        let handle = scheduler.start().unwrap();
        assert!(!handle.wait_fired(1, Duration::from_millis(20)));
    }

    #[test]
    fn test_unreachable_deadline_never_fires() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut scheduler = DelayScheduler::new("forever");
        scheduler.schedule(Duration::from_millis(5), || {});
        let c = counter.clone();
        scheduler.schedule(Duration::MAX, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let handle = scheduler.start().unwrap();
        assert!(handle.wait_fired(1, Duration::from_secs(5)));
        assert!(!handle.wait_fired(2, Duration::from_millis(20)));
        assert_eq!(handle.pending(), 1);

        let start = Instant::now();
        handle.shutdown();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_scheduler_is_complete() {
        let scheduler = DelayScheduler::new("empty");
        assert!(scheduler.is_empty());
        let handle = scheduler.start().unwrap();
        assert!(handle.is_complete());
        assert!(handle.wait_fired(0, Duration::ZERO));
    }
}
