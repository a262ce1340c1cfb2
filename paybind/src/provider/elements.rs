//! The Elements provider: creates one elements group and hands it to widgets.

use std::sync::{Arc, LazyLock};

use crate::config::ProviderConfig;
use crate::diagnostics::DiagnosticSink;
use crate::diff::OptionsDiff;
use crate::error::{InitializationFailure, InvalidHandleError};
use crate::options::Options;
use crate::sdk::{ElementsGroup, HandleSource, SdkHandle};

use super::{Initialization, Initialized, Provider, ProviderContext, ProviderFlavor, ProviderKind};

static DIFF: LazyLock<OptionsDiff> = LazyLock::new(|| {
    OptionsDiff::new(ProviderKind::Elements.name())
        .immutable("clientSecret")
        .immutable("fonts")
});

/// Flavor of the Elements provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementsFlavor;

impl ProviderFlavor for ElementsFlavor {
    type Secondary = Arc<dyn ElementsGroup>;
    type Derived = ();

    const KIND: ProviderKind = ProviderKind::Elements;

    fn initialize(&self, sdk: &SdkHandle, options: &Options) -> Initialization<Self::Secondary, ()> {
        let result = sdk
            .elements(options)
            .map(|secondary| Initialized {
                secondary,
                derived: (),
            })
            .map_err(|error| InitializationFailure::Rejected {
                provider: Self::KIND,
                error,
            });
        Initialization::Complete(result)
    }

    fn apply_updates(
        &self,
        secondary: &Self::Secondary,
        next: &Options,
        previous: &Options,
        sink: &dyn DiagnosticSink,
    ) {
        if let Some(updates) = DIFF.diff(next, Some(previous), sink) {
            secondary.update(&updates);
        }
    }
}

/// A mounted Elements provider.
pub type ElementsProvider = Provider<ElementsFlavor>;

/// Read side of an Elements provider.
pub type ElementsContext = ProviderContext<Arc<dyn ElementsGroup>, ()>;

impl Provider<ElementsFlavor> {
    /// Mounts an Elements provider.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandleError`] if `source` is a ready handle that fails
    /// validation.
    pub fn elements(
        source: impl Into<HandleSource>,
        options: Options,
        config: ProviderConfig,
    ) -> Result<Self, InvalidHandleError> {
        Self::mount(ElementsFlavor, source.into(), options, config)
    }
}
