//! Where observer callbacks run.
//!
//! A [`DispatchTarget::Primary`] callback is queued on a [`MainQueue`], a
//! serial FIFO that its owner drains (think of it as the UI thread's run
//! loop). A [`DispatchTarget::Unspecified`] callback runs inline on whatever
//! thread settled the value.
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, TryLockError};
use std::time::{Duration, Instant};

/// A unit of work scheduled on a [`MainQueue`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// The execution context an observer wants its callback delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchTarget {
    /// Marshaled onto the serial [`MainQueue`], never run inline.
    #[default]
    Primary,
    /// Run synchronously in the context that triggered delivery.
    Unspecified,
}

/// A serial context.
///
/// Cloning gives another handle to the same queue. Jobs run in the order they
/// were dispatched, one at a time, on the thread that drains the queue.
///
/// # Examples
///
/// ```
/// use future_kit::MainQueue;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let queue = MainQueue::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = hits.clone();
/// queue.dispatch(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
/// assert_eq!(hits.load(Ordering::SeqCst), 0);
/// assert_eq!(queue.run_pending(), 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct MainQueue {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    ready: Condvar,
    // Held for the whole drain so two threads never run jobs side by side.
    runner: Mutex<()>,
}

impl MainQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The well-known process queue, created on first use.
    ///
    /// Nothing drains it unless the application does, usually from its main
    /// thread with [`MainQueue::run_until`].
    pub fn global() -> MainQueue {
        static GLOBAL: OnceLock<MainQueue> = OnceLock::new();
        GLOBAL.get_or_init(MainQueue::new).clone()
    }

    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut jobs = self.jobs();
        jobs.push_back(Box::new(job));
        log::trace!("main queue: job dispatched, {} pending", jobs.len());
        drop(jobs);
        self.shared.ready.notify_one();
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Runs queued jobs on the calling thread until the queue is empty,
    /// including jobs dispatched by the jobs themselves.
    ///
    /// Returns the number of jobs run. If another drain is already in
    /// progress (on another thread, or further up this thread's stack) this
    /// returns 0 without running anything.
    pub fn run_pending(&self) -> usize {
        let Some(_running) = self.try_run() else {
            return 0;
        };
        self.drain()
    }

    /// Drives the queue until `done` returns true or `timeout` elapses.
    ///
    /// `done` is checked after every drain, so it may depend on state that
    /// other threads change without going through this queue. Returns the
    /// last value of `done`.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let Some(_running) = self.try_run() else {
            return done();
        };
        let deadline = Instant::now() + timeout;
        loop {
            self.drain();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                log::debug!("main queue: run_until timed out after {:?}", timeout);
                return done();
            }
            let jobs = self.jobs();
            if jobs.is_empty() {
                let wait = (deadline - now).min(POLL_INTERVAL);
                let _ = self
                    .shared
                    .ready
                    .wait_timeout(jobs, wait)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            // The guard must drop before the job runs so jobs can dispatch more.
            let next = self.jobs().pop_front();
            let Some(job) = next else {
                return ran;
            };
            job();
            ran += 1;
        }
    }

    fn try_run(&self) -> Option<MutexGuard<'_, ()>> {
        match self.shared.runner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.shared.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("pending", &self.len())
            .finish()
    }
}
