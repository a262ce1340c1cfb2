//! Provider lookup.
//!
//! A [`Scope`] is the explicit stand-in for "the nearest enclosing providers".
//! Hosts build one per subtree by layering provider contexts onto a parent
//! scope and hand it to the widgets and hooks of that subtree.
//!
//! ```ignore
//! let elements = ElementsProvider::elements(sdk, options, ProviderConfig::default())?;
//! let scope = Scope::root().with_elements(elements.context());
//! let card = WidgetController::new(&scope, ElementKind::Card, WidgetProps::new())?;
//! ```

use std::sync::Arc;

use crate::diagnostics::DiagnosticSink;
use crate::error::{ConflictingProviderError, ContextError, MissingProviderError};
use crate::provider::{CheckoutContext, ElementsContext, EmbeddedCheckoutContext, ProviderKind};
use crate::sdk::SdkHandle;

/// The providers visible at one point of the host's component tree.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    elements: Option<ElementsContext>,
    checkout: Option<CheckoutContext>,
    embedded: Option<EmbeddedCheckoutContext>,
}

impl Scope {
    /// A scope with no providers.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Child scope inside an Elements provider.
    #[must_use]
    pub fn with_elements(&self, context: ElementsContext) -> Self {
        Self {
            elements: Some(context),
            ..self.clone()
        }
    }

    /// Child scope inside a Checkout provider.
    #[must_use]
    pub fn with_checkout(&self, context: CheckoutContext) -> Self {
        Self {
            checkout: Some(context),
            ..self.clone()
        }
    }

    /// Child scope inside an embedded checkout provider.
    #[must_use]
    pub fn with_embedded_checkout(&self, context: EmbeddedCheckoutContext) -> Self {
        Self {
            embedded: Some(context),
            ..self.clone()
        }
    }

    /// The nearest Elements provider.
    ///
    /// # Errors
    ///
    /// Returns [`MissingProviderError`] naming `use_case` if there is none.
    pub fn elements(&self, use_case: &str) -> Result<ElementsContext, MissingProviderError> {
        self.elements
            .clone()
            .ok_or_else(|| MissingProviderError::new(vec![ProviderKind::Elements], use_case))
    }

    /// The nearest Checkout provider.
    ///
    /// # Errors
    ///
    /// Returns [`MissingProviderError`] naming `use_case` if there is none.
    pub fn checkout(&self, use_case: &str) -> Result<CheckoutContext, MissingProviderError> {
        self.checkout
            .clone()
            .ok_or_else(|| MissingProviderError::new(vec![ProviderKind::Checkout], use_case))
    }

    /// The nearest embedded checkout provider.
    ///
    /// # Errors
    ///
    /// Returns [`MissingProviderError`] naming `use_case` if there is none.
    pub fn embedded_checkout(
        &self,
        use_case: &str,
    ) -> Result<EmbeddedCheckoutContext, MissingProviderError> {
        self.embedded.clone().ok_or_else(|| {
            MissingProviderError::new(vec![ProviderKind::EmbeddedCheckout], use_case)
        })
    }

    /// The nearest Elements or Checkout provider, whichever is present.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Conflicting`] if both are present and
    /// [`ContextError::Missing`] if neither is.
    pub fn elements_or_checkout(&self, use_case: &str) -> Result<WidgetHost, ContextError> {
        match (&self.elements, &self.checkout) {
            (Some(_), Some(_)) => Err(ConflictingProviderError::new(use_case).into()),
            (Some(elements), None) => Ok(WidgetHost::Elements(elements.clone())),
            (None, Some(checkout)) => Ok(WidgetHost::Checkout(checkout.clone())),
            (None, None) => Err(MissingProviderError::new(
                vec![ProviderKind::Elements, ProviderKind::Checkout],
                use_case,
            )
            .into()),
        }
    }

    /// The primary SDK handle of the enclosing Elements or Checkout provider.
    ///
    /// `Ok(None)` means the provider exists but has no resolved handle yet.
    ///
    /// # Errors
    ///
    /// Same as [`elements_or_checkout`](Self::elements_or_checkout).
    pub fn sdk(&self, use_case: &str) -> Result<Option<SdkHandle>, ContextError> {
        Ok(self.elements_or_checkout(use_case)?.primary())
    }
}

/// The provider a widget draws its factory from.
#[derive(Debug, Clone)]
pub enum WidgetHost {
    /// An Elements provider.
    Elements(ElementsContext),
    /// A Checkout provider.
    Checkout(CheckoutContext),
}

impl WidgetHost {
    /// Which provider family this is.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Elements(_) => ProviderKind::Elements,
            Self::Checkout(_) => ProviderKind::Checkout,
        }
    }

    /// The provider's primary handle, once resolved.
    #[must_use]
    pub fn primary(&self) -> Option<SdkHandle> {
        match self {
            Self::Elements(context) => context.primary(),
            Self::Checkout(context) => context.primary(),
        }
    }

    /// The provider's diagnostic sink.
    #[must_use]
    pub fn diagnostics(&self) -> Arc<dyn DiagnosticSink> {
        match self {
            Self::Elements(context) => context.diagnostics(),
            Self::Checkout(context) => context.diagnostics(),
        }
    }

    /// Waits for the provider to publish a change.
    ///
    /// Returns `false` once the provider is gone.
    pub async fn changed(&mut self) -> bool {
        match self {
            Self::Elements(context) => context.changed().await,
            Self::Checkout(context) => context.changed().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::options::Options;
    use crate::provider::{CheckoutProvider, ElementsProvider};
    use crate::sdk::HandleSource;

    fn elements() -> ElementsProvider {
        ElementsProvider::elements(HandleSource::empty(), Options::new(), ProviderConfig::default())
            .unwrap()
    }

    fn checkout() -> CheckoutProvider {
        CheckoutProvider::checkout(HandleSource::empty(), Options::new(), ProviderConfig::default())
            .unwrap()
    }

    #[test]
    fn test_missing_provider_is_reported() {
        let err = Scope::root().elements("calls useElements()").unwrap_err();
        assert!(err.to_string().contains("<Elements>"));

        let err = Scope::root()
            .elements_or_checkout("mounts <PaymentElement>")
            .unwrap_err();
        assert!(matches!(err, ContextError::Missing(_)));
    }

    #[test]
    fn test_nested_families_conflict() {
        let (e, c) = (elements(), checkout());
        let scope = Scope::root()
            .with_elements(e.context())
            .with_checkout(c.context());
        assert!(matches!(
            scope.elements_or_checkout("mounts <PaymentElement>"),
            Err(ContextError::Conflicting(_))
        ));
        assert!(scope.sdk("calls useStripe()").is_err());
    }

    #[test]
    fn test_single_family_resolves() {
        let c = checkout();
        let scope = Scope::root().with_checkout(c.context());
        let host = scope.elements_or_checkout("mounts <PaymentElement>").unwrap();
        assert_eq!(host.kind(), ProviderKind::Checkout);
        assert!(scope.sdk("calls useStripe()").unwrap().is_none());
        assert!(scope.embedded_checkout("mounts <EmbeddedCheckout>").is_err());
    }
}
