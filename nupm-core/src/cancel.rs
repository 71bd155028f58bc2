//! Cooperative cancellation.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::Error;

/// A cloneable cancellation token.
///
/// Every public operation accepts a token and honors it between I/O steps
/// and between plan actions. Cancelling after a partially applied plan
/// leaves the project in a well-defined state: manifest and store agree for
/// every action that completed before the cancellation.
///
/// ## Examples
/// ```
/// use nupm_core::Cancellation;
///
/// let cancel = Cancellation::new();
/// assert!(cancel.check().is_ok());
///
/// cancel.cancel();
/// assert!(cancel.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Cancellation::default()
    }

    /// Requests cancellation; every holder of a clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
