//! In-memory payment SDK for exercising `paybind` providers and widgets.
//!
//! Every object records the calls it receives so tests can assert on exact
//! call counts and arguments. Asynchronous SDK entry points can be held open
//! with a gate (a `tokio::sync::oneshot` channel) to drive interleavings by
//! hand.
//!
//! ```ignore
//! let sdk = Arc::new(MockSdk::new());
//! let provider = ElementsProvider::elements(
//!     HandleSource::ready(sdk.clone()),
//!     Options::new(),
//!     ProviderConfig::default(),
//! )?;
//! assert_eq!(sdk.elements_calls().len(), 1);
//! ```

mod checkout;
mod element;
mod embedded;
mod sdk;

pub use checkout::{CheckoutOutcome, MockCheckoutActions, MockCheckoutSession};
pub use element::{MockElement, MockElements};
pub use embedded::MockEmbeddedCheckout;
pub use sdk::MockSdk;

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append-only call log.
#[derive(Debug)]
pub struct Calls<T>(Mutex<Vec<T>>);

impl<T> Default for Calls<T> {
    fn default() -> Self {
        Self(Mutex::new(Vec::new()))
    }
}

impl<T: Clone> Calls<T> {
    fn push(&self, call: T) {
        lock(&self.0).push(call);
    }

    /// Every recorded call, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<T> {
        lock(&self.0).clone()
    }

    /// The most recent call.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        lock(&self.0).last().cloned()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
