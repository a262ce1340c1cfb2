//! Value-or-future normalization.
//!
//! Everything the SDK hands out may arrive either immediately or later. A
//! [`MaybeAsync`] captures both shapes and an [`AsyncResolver`] turns a changing
//! sequence of them into one observable [`AsyncHandle`] that always reflects
//! the latest input. A superseded future keeps running (the SDK offers no
//! cancellation) but its result is dropped; [`Liveness`] flags implement that.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::error::SdkError;

/// Future returned by SDK operations.
pub type SdkFuture<T> = BoxFuture<'static, Result<T, SdkError>>;

/// A value that is either available now or produced by a future.
pub enum MaybeAsync<T> {
    /// Available now.
    Ready(T),
    /// Produced later.
    Deferred(SdkFuture<T>),
}

impl<T> fmt::Debug for MaybeAsync<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("MaybeAsync::Ready(..)"),
            Self::Deferred(_) => f.write_str("MaybeAsync::Deferred(..)"),
        }
    }
}

/// Observable state of a resolution.
#[derive(Debug, Clone)]
pub enum AsyncHandle<T> {
    /// Not settled yet.
    Pending,
    /// Settled successfully.
    Resolved(T),
    /// Settled with an error.
    Rejected(SdkError),
}

impl<T> AsyncHandle<T> {
    /// Returns `true` while unsettled.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns the resolved value, if any.
    #[must_use]
    pub const fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

/// Shared flag checked by asynchronous continuations before they touch state.
///
/// Starts alive; once revoked it never comes back.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// Creates a live flag.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Returns `true` until [`revoke`](Self::revoke) is called on any clone.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Revokes the flag. Returns `true` if it was alive before this call.
    pub fn revoke(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

struct ResolverInner<T> {
    state: watch::Sender<AsyncHandle<T>>,
    current: Mutex<Liveness>,
}

/// Resolves a changing sequence of [`MaybeAsync`] inputs.
///
/// Cloning yields another handle to the same resolver.
pub struct AsyncResolver<T> {
    inner: Arc<ResolverInner<T>>,
}

impl<T> Clone for AsyncResolver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for AsyncResolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.borrow() {
            AsyncHandle::Pending => "pending",
            AsyncHandle::Resolved(_) => "resolved",
            AsyncHandle::Rejected(_) => "rejected",
        };
        f.debug_struct("AsyncResolver")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for AsyncResolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncResolver<T> {
    /// Creates a resolver in the [`AsyncHandle::Pending`] state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(AsyncHandle::Pending);
        Self {
            inner: Arc::new(ResolverInner {
                state,
                current: Mutex::new(Liveness::new()),
            }),
        }
    }

    /// Starts resolving `input`, superseding any earlier input.
    ///
    /// Ready values settle before this returns. Deferred values switch the
    /// state to pending and settle from a spawned task.
    ///
    /// # Panics
    ///
    /// Panics if `input` is deferred and no Tokio runtime is running.
    pub fn resolve(&self, input: MaybeAsync<T>) {
        let token = Liveness::new();
        let mut current = self
            .inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.revoke();
        *current = token.clone();

        match input {
            MaybeAsync::Ready(value) => {
                self.inner.state.send_replace(AsyncHandle::Resolved(value));
            }
            MaybeAsync::Deferred(future) => {
                self.inner.state.send_replace(AsyncHandle::Pending);
                drop(current);
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let settled = match future.await {
                        Ok(value) => AsyncHandle::Resolved(value),
                        Err(err) => AsyncHandle::Rejected(err),
                    };
                    // Checked under the same lock `resolve` revokes under.
                    let _current = inner.current.lock().unwrap_or_else(PoisonError::into_inner);
                    if token.is_alive() {
                        inner.state.send_replace(settled);
                    } else {
                        tracing::trace!("dropping stale resolution");
                    }
                });
            }
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> AsyncHandle<T> {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AsyncHandle<T>> {
        self.inner.state.subscribe()
    }

    /// Waits until the latest input settles and returns the settled state.
    pub async fn settled(&self) -> AsyncHandle<T> {
        let mut rx = self.subscribe();
        rx.wait_for(|h| !h.is_pending())
            .await
            .map_or(AsyncHandle::Pending, |h| h.clone())
    }

    /// Drops whatever is in flight. Later settlements are ignored.
    pub fn close(&self) {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .revoke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn deferred<T: Send + 'static>(rx: oneshot::Receiver<Result<T, SdkError>>) -> MaybeAsync<T> {
        MaybeAsync::Deferred(Box::pin(async move {
            rx.await.unwrap_or_else(|_| Err(SdkError::new("sender dropped")))
        }))
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_ready_value_resolves_synchronously() {
        let resolver = AsyncResolver::new();
        resolver.resolve(MaybeAsync::Ready(7));
        assert_eq!(resolver.current().resolved(), Some(&7));
    }

    #[tokio::test]
    async fn test_deferred_value_is_pending_then_resolved() {
        let resolver = AsyncResolver::new();
        let (tx, rx) = oneshot::channel();
        resolver.resolve(deferred(rx));
        assert!(resolver.current().is_pending());

        tx.send(Ok("sdk")).unwrap();
        let settled = resolver.settled().await;
        assert_eq!(settled.resolved(), Some(&"sdk"));
    }

    #[tokio::test]
    async fn test_none_is_a_valid_resolution() {
        let resolver: AsyncResolver<Option<u8>> = AsyncResolver::new();
        let (tx, rx) = oneshot::channel();
        resolver.resolve(deferred(rx));
        tx.send(Ok(None)).unwrap();

        assert!(matches!(resolver.settled().await, AsyncHandle::Resolved(None)));
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let resolver: AsyncResolver<u8> = AsyncResolver::new();
        let (tx, rx) = oneshot::channel();
        resolver.resolve(deferred(rx));
        tx.send(Err(SdkError::new("network down"))).unwrap();

        match resolver.settled().await {
            AsyncHandle::Rejected(err) => assert_eq!(err.message, "network down"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_superseded_resolution_is_dropped() {
        let resolver = AsyncResolver::new();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();

        resolver.resolve(deferred(first_rx));
        resolver.resolve(deferred(second_rx));

        second_tx.send(Ok("second")).unwrap();
        settle().await;
        first_tx.send(Ok("first")).unwrap();
        settle().await;

        assert_eq!(resolver.current().resolved(), Some(&"second"));
    }

    #[tokio::test]
    async fn test_late_first_resolution_after_ready_value_is_dropped() {
        let resolver = AsyncResolver::new();
        let (tx, rx) = oneshot::channel();
        resolver.resolve(deferred(rx));
        resolver.resolve(MaybeAsync::Ready("sync"));

        tx.send(Ok("async")).unwrap();
        settle().await;
        assert_eq!(resolver.current().resolved(), Some(&"sync"));
    }

    #[tokio::test]
    async fn test_close_ignores_late_settlement() {
        let resolver: AsyncResolver<u8> = AsyncResolver::new();
        let (tx, rx) = oneshot::channel();
        resolver.resolve(deferred(rx));
        resolver.close();

        tx.send(Ok(1)).unwrap();
        settle().await;
        assert!(resolver.current().is_pending());
    }

    #[test]
    fn test_liveness_revokes_once() {
        let live = Liveness::new();
        let clone = live.clone();
        assert!(clone.revoke());
        assert!(!live.is_alive());
        assert!(!live.revoke());
    }
}
