//! The write side of a deferred value.
use std::fmt;
use std::sync::Arc;

use crate::cell::Cell;
use crate::{Deferred, Error, MainQueue, Outcome};

/// The only handle that can settle its [`Deferred`].
///
/// `resolve`, `reject` and friends consume the promise, so a value can be set
/// at most once. A promise dropped without being settled rejects its deferred
/// value with [`ErrorKind::ProducerDropped`](crate::ErrorKind::ProducerDropped),
/// so observers are never left waiting on a producer that is gone.
///
/// # Examples
///
/// ```
/// use future_kit::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (promise, deferred) = Promise::<String>::new();
/// let task1 = thread::spawn(move || block_on(deferred.wait()));
/// promise.resolve("Hi".into());
/// assert_eq!(task1.join().unwrap(), Ok("Hi".to_string()));
/// ```
pub struct Promise<V: Clone + Send + 'static> {
    cell: Arc<Cell<V>>,
}

impl<V: Clone + Send + 'static> Promise<V> {
    /// A promise whose primary observers run on [`MainQueue::global`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, Deferred<V>) {
        Self::with_queue(MainQueue::global())
    }

    pub fn with_queue(queue: MainQueue) -> (Self, Deferred<V>) {
        let cell = Arc::new(Cell::new(queue));
        let deferred = Deferred::from_cell(cell.clone());
        (Self { cell }, deferred)
    }

    /// Another read handle on the value this promise settles.
    pub fn deferred(&self) -> Deferred<V> {
        Deferred::from_cell(self.cell.clone())
    }

    pub fn resolve(self, value: V) {
        self.settle(Ok(value))
    }

    pub fn reject(self, err: Error) {
        self.settle(Err(err))
    }

    pub fn settle(self, outcome: Outcome<V>) {
        let settled = self.cell.settle(outcome);
        debug_assert!(settled, "promise settled twice");
    }

    /// Settles from a completion handler that reports a payload or an error.
    ///
    /// An error wins over a payload. If neither is present the promise is
    /// rejected with a transport error, since the producer broke its contract.
    pub fn complete(self, payload: Option<V>, error: Option<Error>) {
        match (payload, error) {
            (_, Some(err)) => self.reject(err),
            (Some(value), None) => self.resolve(value),
            (None, None) => self.reject(Error::transport("missing data")),
        }
    }
}

impl<V: Clone + Send + 'static> Drop for Promise<V> {
    fn drop(&mut self) {
        if self.cell.settle(Err(Error::producer_dropped())) {
            log::warn!("promise dropped before it was resolved");
        }
    }
}

impl<V: Clone + Send + fmt::Debug + 'static> fmt::Debug for Promise<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Promise").field(&self.cell).finish()
    }
}
