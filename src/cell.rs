use std::fmt;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::Waker;

use crate::{DispatchTarget, Error, Job, MainQueue, Outcome};

pub(crate) enum Observer<V> {
    Any(Box<dyn FnOnce(Outcome<V>) + Send>),
    Success(Box<dyn FnOnce(V) + Send>),
    Failure(Box<dyn FnOnce(Error) + Send>),
}

impl<V: Send + 'static> Observer<V> {
    /// Binds the observer to `outcome`, or returns `None` if it does not care
    /// about this branch.
    fn bind(self, outcome: Outcome<V>) -> Option<Job> {
        let job: Job = match (self, outcome) {
            (Observer::Any(callback), outcome) => Box::new(move || callback(outcome)),
            (Observer::Success(callback), Ok(value)) => Box::new(move || callback(value)),
            (Observer::Failure(callback), Err(err)) => Box::new(move || callback(err)),
            _ => return None,
        };
        Some(job)
    }
}

struct State<V> {
    result: Option<Outcome<V>>,
    // Single list in registration order; the three observer kinds share it.
    observers: Vec<(DispatchTarget, Observer<V>)>,
    wakers: Vec<Waker>,
}

/// The shared state behind a `Promise`/`Deferred` pair.
pub(crate) struct Cell<V> {
    state: Mutex<State<V>>,
    queue: MainQueue,
}

impl<V> Cell<V> {
    pub(crate) fn new(queue: MainQueue) -> Self {
        Self {
            state: Mutex::new(State {
                result: None,
                observers: vec![],
                wakers: vec![],
            }),
            queue,
        }
    }

    pub(crate) fn queue(&self) -> &MainQueue {
        &self.queue
    }

    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.lock().result.is_some()
    }
}

impl<V: Clone + Send + 'static> Cell<V> {
    /// Stores `outcome` if nothing has been stored yet, then notifies every
    /// observer registered so far.
    ///
    /// Returns false, and notifies nobody, if the cell was already settled.
    pub(crate) fn settle(&self, outcome: Outcome<V>) -> bool {
        let (observers, wakers) = {
            let mut state = self.lock();
            if state.result.is_some() {
                return false;
            }
            state.result = Some(outcome.clone());
            (
                mem::take(&mut state.observers),
                mem::take(&mut state.wakers),
            )
        };
        log::trace!(
            "deferred settled ({}), notifying {} observers and {} waiters",
            if outcome.is_ok() { "success" } else { "failure" },
            observers.len(),
            wakers.len()
        );
        // Delivered outside the lock: an observer that registers another
        // observer finds the result already set and is served immediately.
        for (target, observer) in observers {
            self.deliver(target, observer, outcome.clone());
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub(crate) fn register(&self, target: DispatchTarget, observer: Observer<V>) {
        let mut state = self.lock();
        let Some(outcome) = state.result.clone() else {
            state.observers.push((target, observer));
            return;
        };
        drop(state);
        self.deliver(target, observer, outcome);
    }

    /// Returns the outcome if settled, otherwise remembers `waker` for later.
    pub(crate) fn poll_outcome(&self, waker: &Waker) -> Option<Outcome<V>> {
        let mut state = self.lock();
        if let Some(outcome) = state.result.clone() {
            return Some(outcome);
        }
        if !state.wakers.iter().any(|w| w.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
        None
    }

    pub(crate) fn peek(&self) -> Option<Outcome<V>> {
        self.lock().result.clone()
    }

    fn deliver(&self, target: DispatchTarget, observer: Observer<V>, outcome: Outcome<V>) {
        let Some(job) = observer.bind(outcome) else {
            return;
        };
        match target {
            DispatchTarget::Primary => self.queue.dispatch(job),
            DispatchTarget::Unspecified => job(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Cell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Cell")
            .field("result", &state.result)
            .field("observers", &state.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, Observer};
    use crate::{DispatchTarget, Error, MainQueue, Outcome};
    use std::sync::{Arc, Mutex};

    fn counting(hits: &Arc<Mutex<Vec<u32>>>) -> Observer<u32> {
        let hits = hits.clone();
        Observer::Any(Box::new(move |outcome: Outcome<u32>| {
            hits.lock().unwrap().push(outcome.unwrap())
        }))
    }

    #[test]
    fn test_settle_only_once() {
        let cell = Cell::new(MainQueue::new());
        let hits = Arc::new(Mutex::new(vec![]));
        cell.register(DispatchTarget::Unspecified, counting(&hits));

        assert!(cell.settle(Ok(1)));
        assert!(!cell.settle(Ok(2)));
        assert!(!cell.settle(Err(Error::step("late"))));

        assert_eq!(*hits.lock().unwrap(), vec![1]);
        assert_eq!(cell.peek(), Some(Ok(1)));
    }

    #[test]
    fn test_observers_notified_in_registration_order() {
        let cell = Cell::new(MainQueue::new());
        let order = Arc::new(Mutex::new(vec![]));
        for i in 0..4u32 {
            let order = order.clone();
            cell.register(
                DispatchTarget::Unspecified,
                Observer::Success(Box::new(move |v: u32| order.lock().unwrap().push(v + i))),
            );
        }
        cell.settle(Ok(10));
        assert_eq!(*order.lock().unwrap(), vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_filtered_observers_skip_other_branch() {
        let cell = Cell::<u32>::new(MainQueue::new());
        let successes = Arc::new(Mutex::new(0));
        let failures = Arc::new(Mutex::new(0));
        let s = successes.clone();
        let f = failures.clone();
        cell.register(
            DispatchTarget::Primary,
            Observer::Success(Box::new(move |_: u32| *s.lock().unwrap() += 1)),
        );
        cell.register(
            DispatchTarget::Primary,
            Observer::Failure(Box::new(move |_: Error| *f.lock().unwrap() += 1)),
        );
        cell.settle(Err(Error::transport("offline")));

        // The success observer is dropped rather than queued.
        assert_eq!(cell.queue().len(), 1);
        cell.queue().run_pending();
        assert_eq!(*successes.lock().unwrap(), 0);
        assert_eq!(*failures.lock().unwrap(), 1);
    }

    #[test]
    fn test_observer_registered_during_delivery_fires_once() {
        let cell = Arc::new(Cell::new(MainQueue::new()));
        let hits = Arc::new(Mutex::new(vec![]));
        let (inner_cell, inner_hits) = (cell.clone(), hits.clone());
        cell.register(
            DispatchTarget::Unspecified,
            Observer::Any(Box::new(move |outcome: Outcome<u32>| {
                inner_hits.lock().unwrap().push(outcome.unwrap());
                inner_cell.register(DispatchTarget::Unspecified, counting(&inner_hits));
            })),
        );
        cell.settle(Ok(7));
        assert_eq!(*hits.lock().unwrap(), vec![7, 7]);
    }
}
