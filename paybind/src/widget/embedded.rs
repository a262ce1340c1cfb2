//! Mount point of an embedded checkout.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::Scope;
use crate::error::MissingProviderError;
use crate::provider::{EmbeddedCheckoutContext, spawn_in_span};
use crate::resolver::Liveness;
use crate::sdk::{DomNode, EmbeddedCheckout};

struct MountState {
    node: Option<DomNode>,
    mounted: Option<Arc<dyn EmbeddedCheckout>>,
    closed: bool,
}

struct Inner {
    context: EmbeddedCheckoutContext,
    live: Liveness,
    state: Mutex<MountState>,
}

/// Mounts the embedded checkout of the enclosing provider into a node.
pub struct EmbeddedCheckoutMount {
    inner: Arc<Inner>,
}

impl fmt::Debug for EmbeddedCheckoutMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("EmbeddedCheckoutMount")
            .field("node", &state.node)
            .field("mounted", &state.mounted.is_some())
            .finish()
    }
}

impl EmbeddedCheckoutMount {
    /// Creates a mount point inside `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingProviderError`] if no embedded checkout provider is in
    /// scope.
    pub fn new(scope: &Scope) -> Result<Self, MissingProviderError> {
        let context = scope.embedded_checkout("mounts <EmbeddedCheckout>")?;
        Ok(Self {
            inner: Arc::new(Inner {
                context,
                live: Liveness::new(),
                state: Mutex::new(MountState {
                    node: None,
                    mounted: None,
                    closed: false,
                }),
            }),
        })
    }

    /// Attaches the node and mounts as soon as the checkout exists.
    pub fn attach(&self, node: DomNode) {
        {
            let mut state = self.inner.lock();
            if state.closed || state.node.is_some() {
                return;
            }
            state.node = Some(node);
        }
        if self.inner.try_mount() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("no runtime, embedded checkout mounts on the next attach");
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let live = self.inner.live.clone();
        let mut context = self.inner.context.clone();
        spawn_in_span(
            async move {
                while live.is_alive() && context.changed().await {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    if inner.try_mount() {
                        break;
                    }
                }
            },
            tracing::debug_span!("paybind.embedded_checkout.mount"),
        );
    }

    /// Returns `true` once the checkout is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted.is_some()
    }

    /// Unmounts the checkout. Failures are logged and swallowed.
    pub fn unmount(&self) {
        self.inner.close();
    }
}

impl Drop for EmbeddedCheckoutMount {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, MountState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_mount(&self) -> bool {
        let mut state = self.lock();
        if state.closed || state.mounted.is_some() {
            return true;
        }
        let Some(node) = state.node.clone() else {
            return false;
        };
        let Some(checkout) = self.context.secondary() else {
            return false;
        };
        match checkout.mount(&node) {
            Ok(()) => {
                tracing::debug!(node = node.id(), "embedded checkout mounted");
                state.mounted = Some(checkout);
            }
            Err(error) => tracing::warn!(%error, "embedded checkout mount failed"),
        }
        true
    }

    fn close(&self) {
        self.live.revoke();
        let mounted = {
            let mut state = self.lock();
            state.closed = true;
            state.mounted.take()
        };
        if let Some(Err(error)) = mounted.map(|checkout| checkout.unmount()) {
            tracing::debug!(%error, "embedded checkout unmount failed");
        }
    }
}
