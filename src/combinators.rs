//! Composition of deferred values.
//!
//! Every combinator here is built on [`Deferred::chained`], and all of them
//! observe their source on [`DispatchTarget::Unspecified`]: plumbing never
//! hops onto the main queue, only the caller's own observers do.
use std::fmt;

use crate::{Deferred, DispatchTarget, Error, Promise};

impl<V: Clone + Send + 'static> Deferred<V> {
    /// Runs `step` on the value once it arrives and follows the deferred
    /// value it returns.
    ///
    /// A failure anywhere along the way, whether the source failing, `step`
    /// returning `Err`, or the inner value failing, settles the result with
    /// that error. If the source fails, `step` is never called.
    ///
    /// ```
    /// use future_kit::{Deferred, Error, Promise};
    ///
    /// let (promise, user_id) = Promise::<u32>::new();
    /// let name = user_id.chained(|id| {
    ///     if id == 0 {
    ///         return Err(Error::step("no such user"));
    ///     }
    ///     Ok(Deferred::ready(format!("user-{id}")))
    /// });
    /// promise.resolve(7);
    /// assert_eq!(name.peek(), Some(Ok("user-7".to_string())));
    /// ```
    pub fn chained<W, F>(&self, step: F) -> Deferred<W>
    where
        W: Clone + Send + 'static,
        F: FnOnce(V) -> Result<Deferred<W>, Error> + Send + 'static,
    {
        let (promise, chained) = Promise::with_queue(self.queue().clone());
        self.observe(DispatchTarget::Unspecified, move |outcome| {
            match outcome.and_then(step) {
                Ok(next) => next.observe(DispatchTarget::Unspecified, move |outcome| {
                    promise.settle(outcome)
                }),
                Err(err) => promise.reject(err),
            }
        });
        chained
    }

    /// Maps the value with `map`, which may fail.
    pub fn transformed<W, F>(&self, map: F) -> Deferred<W>
    where
        W: Clone + Send + 'static,
        F: FnOnce(V) -> Result<W, Error> + Send + 'static,
    {
        let queue = self.queue().clone();
        self.chained(move |value| map(value).map(|mapped| Deferred::ready_on(queue, mapped)))
    }

    /// Runs `action` on the value and passes the value on unchanged, unless
    /// `action` fails, in which case its error is passed on instead.
    pub fn performing<F>(&self, action: F) -> Deferred<V>
    where
        F: FnOnce(&V) -> Result<(), Error> + Send + 'static,
    {
        let queue = self.queue().clone();
        self.chained(move |value| {
            action(&value)?;
            Ok(Deferred::ready_on(queue, value))
        })
    }
}

impl<V: Clone + Send + fmt::Debug + 'static> Deferred<V> {
    /// Logs the value at info level once it arrives, prefixed with `label`.
    pub fn logged(&self, label: impl Into<String>) -> Deferred<V> {
        let label = label.into();
        self.performing(move |value| {
            log::info!("{label}{value:?}");
            Ok(())
        })
    }
}
