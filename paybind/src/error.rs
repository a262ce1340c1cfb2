//! Error types for the payment SDK bindings.
//!
//! Misuse of the component tree and invalid SDK handles are reported
//! synchronously through [`BindingError`] and its parts. Failures that happen
//! behind an asynchronous boundary are never returned to a caller; they are
//! captured as an [`InitializationFailure`] and published in the provider's
//! context instead.

use std::fmt;

use serde_json::Value;

use crate::provider::ProviderKind;
use crate::widget::ElementKind;

/// Umbrella error for every synchronous failure of the bindings.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindingError {
    /// A provider was handed something that is not a usable SDK handle.
    #[error(transparent)]
    InvalidHandle(#[from] InvalidHandleError),

    /// No provider of the required kind wraps the caller.
    #[error(transparent)]
    MissingProvider(#[from] MissingProviderError),

    /// Two mutually exclusive provider families wrap the caller.
    #[error(transparent)]
    ConflictingProvider(#[from] ConflictingProviderError),

    /// A widget cannot be created under its provider.
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

impl From<ContextError> for BindingError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Missing(e) => Self::MissingProvider(e),
            ContextError::Conflicting(e) => Self::ConflictingProvider(e),
        }
    }
}

/// Category of an [`SdkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkErrorKind {
    /// The SDK does not implement the requested operation.
    Unsupported,
    /// A resolved value failed handle validation.
    InvalidHandle,
    /// The SDK rejected the operation.
    Rejected,
    /// The object was already destroyed.
    Destroyed,
}

impl fmt::Display for SdkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unsupported => "unsupported",
            Self::InvalidHandle => "invalid_handle",
            Self::Rejected => "rejected",
            Self::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Error reported by the external payment SDK.
///
/// Cloneable so it can travel inside published context values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkError {
    /// Machine-readable category.
    pub kind: SdkErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl SdkError {
    /// Creates a new rejection error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: SdkErrorKind::Rejected,
            message: message.into(),
        }
    }

    /// Creates an error for an operation the SDK does not implement.
    #[must_use]
    pub fn unsupported(operation: &str) -> Self {
        Self {
            kind: SdkErrorKind::Unsupported,
            message: format!("`{operation}` is not supported by this SDK"),
        }
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_kind(mut self, kind: SdkErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns `true` for [`SdkErrorKind::Unsupported`].
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.kind == SdkErrorKind::Unsupported
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SdkError {}

/// The handle passed to a provider failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidHandleError {
    /// The provider that rejected the handle.
    pub provider: ProviderKind,
}

impl InvalidHandleError {
    /// Creates a new invalid-handle error for `provider`.
    #[must_use]
    pub const fn new(provider: ProviderKind) -> Self {
        Self { provider }
    }
}

impl fmt::Display for InvalidHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid payment SDK handle supplied to `{}`. Pass a loaded SDK instance, \
             a future resolving to one, or nothing while the SDK is still loading.",
            self.provider
        )
    }
}

impl std::error::Error for InvalidHandleError {}

/// No provider of the expected kind wraps the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingProviderError {
    /// Provider kinds that would have satisfied the lookup.
    pub expected: Vec<ProviderKind>,
    /// What the caller was trying to do, e.g. `"mounts <CardElement>"`.
    pub use_case: String,
}

impl MissingProviderError {
    /// Creates a new missing-provider error.
    #[must_use]
    pub fn new(expected: Vec<ProviderKind>, use_case: impl Into<String>) -> Self {
        Self {
            expected,
            use_case: use_case.into(),
        }
    }
}

impl fmt::Display for MissingProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.expected.iter().map(|k| format!("<{k}>")).collect();
        let names = names.join(" or ");
        write!(
            f,
            "Could not find {names} context; you need to wrap the part of your app that {} in an {names} provider.",
            self.use_case
        )
    }
}

impl std::error::Error for MissingProviderError {}

/// Both the Elements and the Checkout provider families wrap the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingProviderError {
    /// What the caller was trying to do.
    pub use_case: String,
}

impl ConflictingProviderError {
    /// Creates a new conflicting-provider error.
    #[must_use]
    pub fn new(use_case: impl Into<String>) -> Self {
        Self {
            use_case: use_case.into(),
        }
    }
}

impl fmt::Display for ConflictingProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "You cannot wrap the part of your app that {} in both <{}> and <{}> providers.",
            self.use_case,
            ProviderKind::Checkout,
            ProviderKind::Elements
        )
    }
}

impl std::error::Error for ConflictingProviderError {}

/// Failure of a context lookup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    /// No matching provider.
    #[error(transparent)]
    Missing(#[from] MissingProviderError),
    /// Mutually exclusive providers both present.
    #[error(transparent)]
    Conflicting(#[from] ConflictingProviderError),
}

/// A widget could not be created or mounted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WidgetError {
    /// The widget variant has no factory on a checkout session.
    #[error(
        "Invalid Element type {0}. Under a checkout provider you must use a payment, address \
         (with `mode` set to `billing` or `shipping`), express checkout, currency selector \
         or tax id element."
    )]
    UnsupportedInCheckout(&'static str),

    /// An address widget under a checkout provider has no `mode` option.
    #[error("You must supply options.mode. mode must be 'billing' or 'shipping'.")]
    MissingAddressMode,

    /// An address widget under a checkout provider has an unknown `mode`.
    #[error("Invalid options.mode `{0}`. mode must be 'billing' or 'shipping'.")]
    InvalidAddressMode(String),

    /// The SDK failed to create the widget.
    #[error("failed to create {kind}: {error}")]
    Create {
        /// Widget variant.
        kind: ElementKind,
        /// Underlying SDK error.
        error: SdkError,
    },

    /// The SDK failed to mount the widget.
    #[error("failed to mount {kind}: {error}")]
    Mount {
        /// Widget variant.
        kind: ElementKind,
        /// Underlying SDK error.
        error: SdkError,
    },
}

/// Failure of a provider's asynchronous initialization, published as data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InitializationFailure {
    /// The primary handle future failed or resolved to an invalid handle.
    #[error("{provider}: payment SDK handle could not be resolved: {error}")]
    Primary {
        /// Provider whose handle failed.
        provider: ProviderKind,
        /// Underlying SDK error.
        error: SdkError,
    },

    /// The one-shot initialization call failed.
    #[error("{provider} initialization failed: {error}")]
    Rejected {
        /// Provider whose initialization failed.
        provider: ProviderKind,
        /// Underlying SDK error.
        error: SdkError,
    },

    /// The initialization call returned a domain-level error payload.
    #[error("{provider} initialization returned an error: {payload}")]
    Payload {
        /// Provider whose initialization failed.
        provider: ProviderKind,
        /// The SDK's error payload.
        payload: Value,
    },
}

impl InitializationFailure {
    /// Returns the provider that failed.
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::Primary { provider, .. }
            | Self::Rejected { provider, .. }
            | Self::Payload { provider, .. } => *provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_provider_names_every_kind() {
        let err = MissingProviderError::new(
            vec![ProviderKind::Elements, ProviderKind::Checkout],
            "calls useStripe()",
        );
        let msg = err.to_string();
        assert!(msg.contains("<Elements> or <CheckoutProvider>"));
        assert!(msg.contains("calls useStripe()"));
    }

    #[test]
    fn test_invalid_handle_names_provider() {
        let msg = InvalidHandleError::new(ProviderKind::EmbeddedCheckout).to_string();
        assert!(msg.contains("`EmbeddedCheckoutProvider`"));
    }

    #[test]
    fn test_context_error_converts_into_binding_error() {
        let err: BindingError =
            ContextError::from(ConflictingProviderError::new("mounts <PaymentElement>")).into();
        assert!(matches!(err, BindingError::ConflictingProvider(_)));
    }

    #[test]
    fn test_sdk_error_display() {
        let err = SdkError::unsupported("register_wrapper");
        assert!(err.is_unsupported());
        assert_eq!(
            err.to_string(),
            "unsupported: `register_wrapper` is not supported by this SDK"
        );
    }
}
