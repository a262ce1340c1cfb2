//! Embedded checkout double.

use std::sync::atomic::{AtomicUsize, Ordering};

use paybind::error::{SdkError, SdkErrorKind};
use paybind::sdk::{DomNode, EmbeddedCheckout};
use paybind::Options;

use crate::Calls;

/// A recorded embedded checkout.
#[derive(Debug)]
pub struct MockEmbeddedCheckout {
    options: Options,
    mounts: Calls<DomNode>,
    unmounts: AtomicUsize,
    destroys: AtomicUsize,
}

impl MockEmbeddedCheckout {
    /// Creates a checkout as `init_embedded_checkout(options)` would.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            mounts: Calls::default(),
            unmounts: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
        }
    }

    /// Options the checkout was created with.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Nodes the checkout was mounted into.
    #[must_use]
    pub fn mounts(&self) -> Vec<DomNode> {
        self.mounts.all()
    }

    /// Number of `unmount` calls.
    #[must_use]
    pub fn unmount_count(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }

    /// Number of `destroy` calls.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    fn ensure_alive(&self) -> Result<(), SdkError> {
        if self.destroy_count() > 0 {
            return Err(SdkError::new("embedded checkout was destroyed").with_kind(SdkErrorKind::Destroyed));
        }
        Ok(())
    }
}

impl EmbeddedCheckout for MockEmbeddedCheckout {
    fn mount(&self, node: &DomNode) -> Result<(), SdkError> {
        self.ensure_alive()?;
        self.mounts.push(node.clone());
        Ok(())
    }

    fn unmount(&self) -> Result<(), SdkError> {
        self.unmounts.fetch_add(1, Ordering::SeqCst);
        self.ensure_alive()
    }

    fn destroy(&self) -> Result<(), SdkError> {
        self.ensure_alive()?;
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
