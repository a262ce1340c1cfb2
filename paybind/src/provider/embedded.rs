//! The embedded checkout provider.
//!
//! Unlike the other providers it cannot initialize until its options carry a
//! `clientSecret` or a `fetchClientSecret` callback, and it owns its secondary
//! object outright: the embedded checkout is destroyed when the provider goes
//! away, including an instance that only arrives after unmount.

use std::sync::{Arc, LazyLock};

use crate::config::ProviderConfig;
use crate::diagnostics::DiagnosticSink;
use crate::diff::OptionsDiff;
use crate::error::{InitializationFailure, InvalidHandleError};
use crate::options::Options;
use crate::sdk::{EmbeddedCheckout, HandleSource, SdkHandle};

use super::{Initialization, Initialized, Provider, ProviderContext, ProviderFlavor, ProviderKind};

static DIFF: LazyLock<OptionsDiff> = LazyLock::new(|| {
    OptionsDiff::new(ProviderKind::EmbeddedCheckout.name())
        .immutable_with_hint(
            "clientSecret",
            Some(
                "You cannot change the client secret after setting it. Unmount and create a new \
                 instance of EmbeddedCheckoutProvider instead.",
            ),
        )
        .immutable_with_hint(
            "fetchClientSecret",
            Some(
                "You cannot change fetchClientSecret after setting it. Unmount and create a new \
                 instance of EmbeddedCheckoutProvider instead.",
            ),
        )
        .immutable_with_hint(
            "onComplete",
            Some("You cannot change the onComplete option after setting it."),
        )
        .immutable_with_hint(
            "onShippingDetailsChange",
            Some("You cannot change the onShippingDetailsChange option after setting it."),
        )
        .immutable_with_hint(
            "onLineItemsChange",
            Some("You cannot change the onLineItemsChange option after setting it."),
        )
});

/// Flavor of the embedded checkout provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedCheckoutFlavor;

impl ProviderFlavor for EmbeddedCheckoutFlavor {
    type Secondary = Arc<dyn EmbeddedCheckout>;
    type Derived = ();

    const KIND: ProviderKind = ProviderKind::EmbeddedCheckout;

    fn ready_to_initialize(&self, options: &Options) -> bool {
        options.has_value("clientSecret") || options.has_value("fetchClientSecret")
    }

    fn initialize(&self, sdk: &SdkHandle, options: &Options) -> Initialization<Self::Secondary, ()> {
        let started = sdk.init_embedded_checkout(options);
        Initialization::Pending(Box::pin(async move {
            started
                .await
                .map(|secondary| Initialized {
                    secondary,
                    derived: (),
                })
                .map_err(|error| InitializationFailure::Rejected {
                    provider: Self::KIND,
                    error,
                })
        }))
    }

    fn apply_updates(
        &self,
        _secondary: &Self::Secondary,
        next: &Options,
        previous: &Options,
        sink: &dyn DiagnosticSink,
    ) {
        // Every option of an embedded checkout is fixed at creation.
        if let Some(ignored) = DIFF.diff(next, Some(previous), sink) {
            tracing::trace!(keys = ?ignored.keys().collect::<Vec<_>>(), "embedded checkout options have no live update");
        }
    }

    fn teardown(secondary: &Self::Secondary) {
        if let Err(error) = secondary.destroy() {
            tracing::debug!(%error, "embedded checkout destroy failed");
        }
    }
}

/// A mounted embedded checkout provider.
pub type EmbeddedCheckoutProvider = Provider<EmbeddedCheckoutFlavor>;

/// Read side of an embedded checkout provider.
pub type EmbeddedCheckoutContext = ProviderContext<Arc<dyn EmbeddedCheckout>, ()>;

impl Provider<EmbeddedCheckoutFlavor> {
    /// Mounts an embedded checkout provider.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandleError`] if `source` is a ready handle that fails
    /// validation.
    pub fn embedded_checkout(
        source: impl Into<HandleSource>,
        options: Options,
        config: ProviderConfig,
    ) -> Result<Self, InvalidHandleError> {
        Self::mount(EmbeddedCheckoutFlavor, source.into(), options, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Opaque;

    #[test]
    fn test_requires_a_client_secret_source() {
        let flavor = EmbeddedCheckoutFlavor;
        assert!(!flavor.ready_to_initialize(&Options::new()));
        assert!(!flavor.ready_to_initialize(&Options::new().with("clientSecret", serde_json::Value::Null)));
        assert!(flavor.ready_to_initialize(&Options::new().with("clientSecret", "cs_1")));
        assert!(flavor.ready_to_initialize(&Options::new().with("fetchClientSecret", Opaque::new(()))));
    }
}
