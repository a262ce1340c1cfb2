//! The Checkout provider: starts one checkout session and loads its actions.
//!
//! Initialization is two SDK calls: `init_checkout(options)` and then
//! `load_actions()` on the returned session. The session's `change`
//! notifications update the published [`CheckoutState`] for as long as the
//! provider is mounted.
//!
//! Live option changes are limited to `elementsOptions.appearance` and
//! `elementsOptions.fonts`, which the SDK applies through two distinct calls.

use std::fmt;
use std::sync::{Arc, LazyLock};

use serde_json::{Map, Value};

use crate::config::{ProviderConfig, SessionShape};
use crate::diagnostics::DiagnosticSink;
use crate::diff::OptionsDiff;
use crate::error::{InitializationFailure, InvalidHandleError};
use crate::options::Options;
use crate::sdk::{CheckoutActions, CheckoutSession, HandleSource, LoadActionsResult, SdkHandle, Subscription};

use super::{
    DerivedPublisher, Initialization, Initialized, Provider, ProviderContext, ProviderFlavor,
    ProviderKind,
};

const ELEMENTS_OPTIONS: &str = "elementsOptions";

static DIFF: LazyLock<OptionsDiff> = LazyLock::new(|| {
    OptionsDiff::new(ProviderKind::Checkout.name())
        .immutable("clientSecret")
        .immutable("fetchClientSecret")
});

static ELEMENTS_DIFF: LazyLock<OptionsDiff> =
    LazyLock::new(|| OptionsDiff::new(ProviderKind::Checkout.name()));

/// Derived state of the Checkout provider.
#[derive(Clone, Default)]
pub struct CheckoutState {
    actions: Option<Arc<dyn CheckoutActions>>,
    session: Value,
    shape: SessionShape,
}

impl CheckoutState {
    /// The loaded actions.
    #[must_use]
    pub fn actions(&self) -> Option<&Arc<dyn CheckoutActions>> {
        self.actions.as_ref()
    }

    /// The latest session snapshot.
    #[must_use]
    pub const fn session(&self) -> &Value {
        &self.session
    }

    /// The session as exposed to descendants, shaped per [`SessionShape`].
    #[must_use]
    pub fn view(&self) -> Map<String, Value> {
        match self.shape {
            SessionShape::Flattened => match &self.session {
                Value::Object(fields) => fields.clone(),
                Value::Null => Map::new(),
                other => Map::from_iter([("session".to_owned(), other.clone())]),
            },
            SessionShape::Nested => Map::from_iter([("session".to_owned(), self.session.clone())]),
        }
    }
}

impl fmt::Debug for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutState")
            .field("actions", &self.actions.is_some())
            .field("session", &self.session)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Flavor of the Checkout provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckoutFlavor {
    shape: SessionShape,
}

impl CheckoutFlavor {
    /// Creates a flavor publishing sessions in `shape`.
    #[must_use]
    pub const fn new(shape: SessionShape) -> Self {
        Self { shape }
    }
}

impl ProviderFlavor for CheckoutFlavor {
    type Secondary = Arc<dyn CheckoutSession>;
    type Derived = CheckoutState;

    const KIND: ProviderKind = ProviderKind::Checkout;

    fn initialize(
        &self,
        sdk: &SdkHandle,
        options: &Options,
    ) -> Initialization<Self::Secondary, CheckoutState> {
        let started = sdk.init_checkout(options);
        let shape = self.shape;
        Initialization::Pending(Box::pin(async move {
            let rejected = |error| InitializationFailure::Rejected {
                provider: Self::KIND,
                error,
            };
            let session = started.await.map_err(rejected)?;
            match session.load_actions().await.map_err(rejected)? {
                LoadActionsResult::Success(actions) => {
                    let snapshot = actions.session();
                    Ok(Initialized {
                        secondary: session,
                        derived: CheckoutState {
                            actions: Some(actions),
                            session: snapshot,
                            shape,
                        },
                    })
                }
                LoadActionsResult::Error(payload) => Err(InitializationFailure::Payload {
                    provider: Self::KIND,
                    payload,
                }),
            }
        }))
    }

    fn apply_updates(
        &self,
        secondary: &Self::Secondary,
        next: &Options,
        previous: &Options,
        sink: &dyn DiagnosticSink,
    ) {
        if let Some(ignored) = DIFF.diff(
            &next.without(ELEMENTS_OPTIONS),
            Some(&previous.without(ELEMENTS_OPTIONS)),
            sink,
        ) {
            tracing::trace!(keys = ?ignored.keys().collect::<Vec<_>>(), "checkout options have no live update");
        }

        let empty = Options::new();
        let next_elements = next.get_object(ELEMENTS_OPTIONS).unwrap_or(&empty);
        let previous_elements = previous.get_object(ELEMENTS_OPTIONS).unwrap_or(&empty);
        let Some(updates) = ELEMENTS_DIFF.diff(next_elements, Some(previous_elements), sink) else {
            return;
        };
        if let Some(appearance) = updates.get("appearance") {
            secondary.change_appearance(appearance);
        }
        if let Some(fonts) = updates.get("fonts") {
            secondary.load_fonts(fonts);
        }
    }

    fn subscribe(
        &self,
        secondary: &Self::Secondary,
        publisher: DerivedPublisher<Self::Secondary, CheckoutState>,
    ) -> Option<Subscription> {
        let id = secondary.on_change(Arc::new(move |session: &Value| {
            let session = session.clone();
            publisher.publish(|state| state.session = session);
        }));
        let session = Arc::clone(secondary);
        Some(Subscription::new(move || session.off_change(id)))
    }
}

/// A mounted Checkout provider.
pub type CheckoutProvider = Provider<CheckoutFlavor>;

/// Read side of a Checkout provider.
pub type CheckoutContext = ProviderContext<Arc<dyn CheckoutSession>, CheckoutState>;

impl Provider<CheckoutFlavor> {
    /// Mounts a Checkout provider, shaping sessions per `config`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandleError`] if `source` is a ready handle that fails
    /// validation.
    pub fn checkout(
        source: impl Into<HandleSource>,
        options: Options,
        config: ProviderConfig,
    ) -> Result<Self, InvalidHandleError> {
        let flavor = CheckoutFlavor::new(config.binding.session_shape);
        Self::mount(flavor, source.into(), options, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_view_merges_session_fields() {
        let state = CheckoutState {
            actions: None,
            session: json!({"total": 1200, "currency": "usd"}),
            shape: SessionShape::Flattened,
        };
        let view = state.view();
        assert_eq!(view.get("total"), Some(&json!(1200)));
        assert!(!view.contains_key("session"));
    }

    #[test]
    fn test_nested_view_keeps_session_under_key() {
        let state = CheckoutState {
            actions: None,
            session: json!({"total": 1200}),
            shape: SessionShape::Nested,
        };
        assert_eq!(state.view().get("session"), Some(&json!({"total": 1200})));
    }

    #[test]
    fn test_default_state_has_empty_view() {
        assert!(CheckoutState::default().view().is_empty());
    }
}
