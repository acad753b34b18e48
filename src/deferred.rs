//! The read side of a deferred value.
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::cell::{Cell, Observer};
use crate::{DispatchTarget, Error, MainQueue, Outcome};

/// A value that becomes available at most once.
///
/// `Deferred` can be cloned and shared; every clone observes the same cell.
/// Observers attached before the value arrives are notified in registration
/// order when it does. Observers attached afterwards are notified right away.
/// Either way each observer runs exactly once, on its [`DispatchTarget`].
///
/// # Examples
///
/// ```
/// use future_kit::{Deferred, DispatchTarget};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let (a, b) = (seen.clone(), seen.clone());
/// Deferred::ready("🍓")
///     .on_success(DispatchTarget::Unspecified, move |v| a.lock().unwrap().push(v))
///     .on_failure(DispatchTarget::Unspecified, move |_| b.lock().unwrap().push("💥"));
/// assert_eq!(*seen.lock().unwrap(), vec!["🍓"]);
/// ```
pub struct Deferred<V> {
    cell: Arc<Cell<V>>,
}

impl<V> Clone for Deferred<V> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<V> Deferred<V> {
    pub(crate) fn from_cell(cell: Arc<Cell<V>>) -> Self {
        Self { cell }
    }

    /// The queue [`DispatchTarget::Primary`] observers of this value run on.
    pub fn queue(&self) -> &MainQueue {
        self.cell.queue()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.is_resolved()
    }
}

impl<V: Clone + Send + 'static> Deferred<V> {
    /// An already resolved value whose primary observers go to
    /// [`MainQueue::global`].
    pub fn ready(value: V) -> Self {
        Self::settled_on(MainQueue::global(), Ok(value))
    }

    pub fn ready_on(queue: MainQueue, value: V) -> Self {
        Self::settled_on(queue, Ok(value))
    }

    /// An already rejected value, for producers that fail before they start.
    pub fn failed(err: Error) -> Self {
        Self::settled_on(MainQueue::global(), Err(err))
    }

    pub fn settled(outcome: Outcome<V>) -> Self {
        Self::settled_on(MainQueue::global(), outcome)
    }

    fn settled_on(queue: MainQueue, outcome: Outcome<V>) -> Self {
        let cell = Cell::new(queue);
        cell.settle(outcome);
        Self::from_cell(Arc::new(cell))
    }

    /// Calls `callback` once with the outcome.
    pub fn observe<F>(&self, target: DispatchTarget, callback: F)
    where
        F: FnOnce(Outcome<V>) + Send + 'static,
    {
        self.cell.register(target, Observer::Any(Box::new(callback)));
    }

    /// Calls `callback` once with the value, only if there is one.
    pub fn on_success<F>(&self, target: DispatchTarget, callback: F) -> &Self
    where
        F: FnOnce(V) + Send + 'static,
    {
        self.cell.register(target, Observer::Success(Box::new(callback)));
        self
    }

    /// Calls `callback` once with the error, only if there is one.
    pub fn on_failure<F>(&self, target: DispatchTarget, callback: F) -> &Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.cell.register(target, Observer::Failure(Box::new(callback)));
        self
    }

    /// The outcome, if it has arrived.
    pub fn peek(&self) -> Option<Outcome<V>> {
        self.cell.peek()
    }

    /// A future that completes with the outcome. Any number of tasks may
    /// wait on the same value.
    pub fn wait(&self) -> Wait<V> {
        Wait {
            cell: self.cell.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Deferred<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&self.cell).finish()
    }
}

/// Future returned by [`Deferred::wait`].
#[must_use = "futures do nothing unless polled"]
pub struct Wait<V> {
    cell: Arc<Cell<V>>,
}

impl<V: Clone + Send + 'static> Future for Wait<V> {
    type Output = Outcome<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.cell.poll_outcome(cx.waker()) {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl<V: Clone + Send + 'static> IntoFuture for Deferred<V> {
    type Output = Outcome<V>;
    type IntoFuture = Wait<V>;

    fn into_future(self) -> Self::IntoFuture {
        Wait { cell: self.cell }
    }
}

#[cfg(test)]
mod tests {
    use super::Deferred;
    use crate::{DispatchTarget, Error, MainQueue, Outcome, Promise};
    use futures::executor::block_on;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_ready_delivers_to_late_observers() {
        let queue = MainQueue::new();
        let ready = Deferred::ready_on(queue.clone(), String::from("🍓"));
        let seen = Arc::new(Mutex::new(vec![]));
        for target in [DispatchTarget::Unspecified, DispatchTarget::Primary] {
            let seen = seen.clone();
            ready.observe(target, move |outcome| seen.lock().unwrap().push(outcome));
        }
        assert_eq!(queue.run_pending(), 1);
        let expected: Outcome<String> = Ok("🍓".to_string());
        assert_eq!(*seen.lock().unwrap(), vec![expected.clone(), expected]);
    }

    #[test]
    fn test_primary_is_never_inline_unspecified_always_is() {
        let queue = MainQueue::new();
        let ready = Deferred::ready_on(queue.clone(), 1);
        let primary = Arc::new(Mutex::new(0));
        let inline = Arc::new(Mutex::new(0));

        let p = primary.clone();
        ready.on_success(DispatchTarget::Primary, move |_| *p.lock().unwrap() += 1);
        assert_eq!(*primary.lock().unwrap(), 0);

        let i = inline.clone();
        ready.on_success(DispatchTarget::Unspecified, move |_| *i.lock().unwrap() += 1);
        assert_eq!(*inline.lock().unwrap(), 1);

        queue.run_pending();
        assert_eq!(*primary.lock().unwrap(), 1);
    }

    #[test]
    fn test_failed_only_reaches_failure_observers() {
        let failed = Deferred::<u32>::failed(Error::transport("NetworkTimeout"));
        let seen = Arc::new(Mutex::new(vec![]));
        let (s, f) = (seen.clone(), seen.clone());
        failed
            .on_success(DispatchTarget::Unspecified, move |v| {
                s.lock().unwrap().push(format!("ok {v}"))
            })
            .on_failure(DispatchTarget::Unspecified, move |e| {
                f.lock().unwrap().push(e.message().to_string())
            });
        assert_eq!(*seen.lock().unwrap(), vec!["NetworkTimeout".to_string()]);
        assert_eq!(failed.peek(), Some(Err(Error::transport("NetworkTimeout"))));
    }

    #[test]
    fn test_wait_from_another_thread() {
        let (promise, deferred) = Promise::<String>::new();
        let waiter = thread::spawn(move || block_on(deferred.wait()));
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.resolve(String::from("🍓"));
        });
        producer.join().expect("The producer thread has panicked");
        let outcome = waiter.join().expect("The waiter thread has panicked");
        assert_eq!(outcome, Ok("🍓".to_string()));
    }

    #[test]
    fn test_two_waiters_same_value() {
        let (promise, deferred) = Promise::<u32>::new();
        let other = deferred.clone();
        let task1 = thread::spawn(move || block_on(async { deferred.await }));
        let task2 = thread::spawn(move || block_on(other.wait()));
        promise.reject(Error::decoding("bad payload"));
        let expected: Outcome<u32> = Err(Error::decoding("bad payload"));
        assert_eq!(task1.join().expect("The task1 thread has panicked"), expected);
        assert_eq!(task2.join().expect("The task2 thread has panicked"), expected);
    }

    #[test]
    fn test_is_resolved() {
        let (promise, deferred) = Promise::new();
        assert!(!deferred.is_resolved());
        assert_eq!(deferred.peek(), None);
        promise.resolve(3u8);
        assert!(deferred.is_resolved());
    }
}
