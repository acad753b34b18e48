//! Single-assignment deferred values.
//!
//! A [`Promise`] is the write side: whoever creates it is the only one who can
//! resolve or reject it, exactly once. A [`Deferred`] is the read side: it can
//! be cloned and handed out freely, and any number of observers can be
//! attached to it before or after the value arrives. Each observer runs once,
//! on the [`DispatchTarget`] it asked for.
//!
//! ```
//! use future_kit::{DispatchTarget, MainQueue, Promise};
//! use std::sync::{Arc, Mutex};
//! use std::thread;
//!
//! let queue = MainQueue::new();
//! let (promise, deferred) = Promise::<u32>::with_queue(queue.clone());
//! let seen = Arc::new(Mutex::new(None));
//! let slot = seen.clone();
//! deferred
//!     .transformed(|n| Ok(n * 2))
//!     .on_success(DispatchTarget::Primary, move |n| *slot.lock().unwrap() = Some(n));
//!
//! thread::spawn(move || promise.resolve(21)).join().unwrap();
//! queue.run_pending();
//! assert_eq!(*seen.lock().unwrap(), Some(42));
//! ```
use std::fmt;

mod cell;
mod combinators;
pub mod deferred;
pub mod dispatch;
pub mod promise;

pub use deferred::{Deferred, Wait};
pub use dispatch::{DispatchTarget, Job, MainQueue};
pub use promise::Promise;

/// The terminal result carried by a [`Deferred`].
pub type Outcome<V> = Result<V, Error>;

/// Broad category of a failure. The core relays it untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport underneath the producer failed.
    Transport,
    /// A payload could not be turned into the expected shape.
    Decoding,
    /// A chaining, transforming or performing closure failed.
    Step,
    /// The [`Promise`] was dropped without being resolved or rejected.
    ProducerDropped,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Transport => "transport failure",
            ErrorKind::Decoding => "decoding failure",
            ErrorKind::Step => "step failure",
            ErrorKind::ProducerDropped => "producer dropped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decoding, message)
    }

    pub fn step(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Step, message)
    }

    pub(crate) fn producer_dropped() -> Self {
        Self::new(
            ErrorKind::ProducerDropped,
            "promise dropped before it was resolved",
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
