//! The contract the external payment SDK must implement.
//!
//! The bindings never look inside the SDK. They call the small surface below
//! and treat everything else as opaque:
//!
//! - [`PaymentSdk`] - the primary handle supplied by the host application
//! - [`ElementsGroup`] - secondary handle of the Elements provider
//! - [`CheckoutSession`] and [`CheckoutActions`] - secondary handle of the
//!   Checkout provider and the actions it loads
//! - [`EmbeddedCheckout`] - secondary handle of the embedded checkout provider
//! - [`Element`] - one widget mounted into one DOM node
//!
//! Handles enter a provider through a [`HandleSource`], which accepts nothing
//! (pre-hydration), a ready handle, or a future of an optional handle.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::Shared;
use serde_json::Value;

use crate::config::AppInfo;
use crate::error::{InvalidHandleError, SdkError, SdkErrorKind};
use crate::options::{OptionValue, Options};
use crate::provider::ProviderKind;
use crate::resolver::{MaybeAsync, SdkFuture};
use crate::widget::{ElementEvent, ElementKind};

/// Shared primary SDK handle.
pub type SdkHandle = Arc<dyn PaymentSdk>;

/// Listener registered with the SDK for one event.
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifier the SDK assigns to a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Methods a primary handle may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `elements(options)`.
    Elements,
    /// Tokenizes payment details.
    CreateToken,
    /// Creates a payment method.
    CreatePaymentMethod,
    /// Confirms a card payment.
    ConfirmCardPayment,
    /// `init_checkout(options)`.
    InitCheckout,
    /// `init_embedded_checkout(options)`.
    InitEmbeddedCheckout,
    /// Wrapper/app-info registration.
    RegisterWrapper,
}

/// Capabilities every primary handle must expose to be accepted.
pub const REQUIRED_CAPABILITIES: [Capability; 4] = [
    Capability::Elements,
    Capability::CreateToken,
    Capability::CreatePaymentMethod,
    Capability::ConfirmCardPayment,
];

/// The primary SDK handle.
pub trait PaymentSdk: Send + Sync {
    /// Reports whether the handle exposes `capability`.
    fn supports(&self, capability: Capability) -> bool;

    /// Creates the elements group. Called once per Elements provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK rejects the options.
    fn elements(&self, options: &Options) -> Result<Arc<dyn ElementsGroup>, SdkError>;

    /// Starts a checkout session. Called once per Checkout provider.
    fn init_checkout(&self, _options: &Options) -> SdkFuture<Arc<dyn CheckoutSession>> {
        Box::pin(async { Err(SdkError::unsupported("init_checkout")) })
    }

    /// Starts an embedded checkout. Called once per embedded checkout provider.
    fn init_embedded_checkout(&self, _options: &Options) -> SdkFuture<Arc<dyn EmbeddedCheckout>> {
        Box::pin(async { Err(SdkError::unsupported("init_embedded_checkout")) })
    }

    /// Registers the binding library with the SDK. Best effort.
    ///
    /// # Errors
    ///
    /// Returns [`SdkErrorKind::Unsupported`] when the SDK has no registration hook.
    fn register_wrapper(&self, _info: &AppInfo) -> Result<(), SdkError> {
        Err(SdkError::unsupported("register_wrapper"))
    }
}

/// Returns `true` if `sdk` exposes every [`REQUIRED_CAPABILITIES`] entry.
#[must_use]
pub fn is_valid_handle(sdk: &dyn PaymentSdk) -> bool {
    REQUIRED_CAPABILITIES.iter().all(|c| sdk.supports(*c))
}

/// Secondary handle of the Elements provider: a widget factory.
pub trait ElementsGroup: Send + Sync {
    /// Creates a widget of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create(&self, kind: ElementKind, options: &Options) -> Result<Arc<dyn Element>, SdkError>;

    /// Applies group-wide option updates.
    fn update(&self, options: &Options);

    /// Returns the widget of `kind` created through this group, if any.
    fn get_element(&self, _kind: ElementKind) -> Option<Arc<dyn Element>> {
        None
    }
}

/// One SDK widget.
pub trait Element: Send + Sync {
    /// Mounts into `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot host the widget.
    fn mount(&self, node: &DomNode) -> Result<(), SdkError>;

    /// Registers `listener` for `event`.
    fn on(&self, event: ElementEvent, listener: EventListener) -> ListenerId;

    /// Removes a listener registered with [`on`](Self::on).
    fn off(&self, event: ElementEvent, listener: ListenerId);

    /// Applies option updates. Widgets without an update surface ignore them.
    fn update(&self, _options: &Options) {}

    /// Destroys the widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the widget was already invalidated.
    fn destroy(&self) -> Result<(), SdkError>;
}

/// Outcome of [`CheckoutSession::load_actions`].
#[derive(Clone)]
pub enum LoadActionsResult {
    /// Actions are available.
    Success(Arc<dyn CheckoutActions>),
    /// The SDK answered with a domain-level error payload.
    Error(Value),
}

impl fmt::Debug for LoadActionsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => f.write_str("LoadActionsResult::Success(..)"),
            Self::Error(payload) => f.debug_tuple("LoadActionsResult::Error").field(payload).finish(),
        }
    }
}

/// Session actions loaded from a checkout session.
///
/// Payment operations themselves are out of the bindings' hands; hosts reach
/// them by downcasting through [`as_any`](Self::as_any).
pub trait CheckoutActions: Send + Sync {
    /// Current session snapshot.
    fn session(&self) -> Value;

    /// The concrete SDK object.
    fn as_any(&self) -> &dyn Any;
}

/// Secondary handle of the Checkout provider.
pub trait CheckoutSession: Send + Sync {
    /// Loads the session actions.
    fn load_actions(&self) -> SdkFuture<LoadActionsResult>;

    /// Subscribes to session `change` notifications.
    fn on_change(&self, listener: EventListener) -> ListenerId;

    /// Removes a `change` listener.
    fn off_change(&self, listener: ListenerId);

    /// Applies a new appearance to every widget of the session.
    fn change_appearance(&self, appearance: &OptionValue);

    /// Loads additional fonts.
    fn load_fonts(&self, fonts: &OptionValue);

    /// Creates the payment widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create_payment_element(&self, options: &Options) -> Result<Arc<dyn Element>, SdkError>;

    /// Creates the billing address widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create_billing_address_element(
        &self,
        options: &Options,
    ) -> Result<Arc<dyn Element>, SdkError>;

    /// Creates the shipping address widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create_shipping_address_element(
        &self,
        options: &Options,
    ) -> Result<Arc<dyn Element>, SdkError>;

    /// Creates the express checkout widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create_express_checkout_element(
        &self,
        options: &Options,
    ) -> Result<Arc<dyn Element>, SdkError>;

    /// Creates the currency selector widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create_currency_selector_element(&self) -> Result<Arc<dyn Element>, SdkError> {
        Err(SdkError::unsupported("create_currency_selector_element"))
    }

    /// Creates the tax id widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the widget.
    fn create_tax_id_element(&self, _options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        Err(SdkError::unsupported("create_tax_id_element"))
    }
}

/// Secondary handle of the embedded checkout provider.
pub trait EmbeddedCheckout: Send + Sync {
    /// Mounts the checkout into `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot host the checkout.
    fn mount(&self, node: &DomNode) -> Result<(), SdkError>;

    /// Unmounts from the current node.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkout was already invalidated.
    fn unmount(&self) -> Result<(), SdkError>;

    /// Destroys the checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkout was already invalidated.
    fn destroy(&self) -> Result<(), SdkError>;
}

/// A mount point in the host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomNode(Arc<str>);

impl DomNode {
    /// Creates a node reference from its id.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The node id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Guard that releases an SDK subscription when dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps the function that undoes a subscription.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Releases now instead of on drop.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

type SharedHandleFuture = Shared<SdkFuture<Option<SdkHandle>>>;

#[derive(Clone)]
enum SourceRepr {
    Empty,
    Ready(SdkHandle),
    Deferred(Arc<SharedHandleFuture>),
}

/// What a host passes as "the SDK" on each render.
///
/// Identity matters: a provider compares sources across renders to notice a
/// replaced handle, so hosts should keep and re-pass the same source (clones
/// share identity) rather than rebuilding it every render.
#[derive(Clone)]
pub struct HandleSource(SourceRepr);

impl HandleSource {
    /// No handle yet, e.g. before hydration.
    #[must_use]
    pub const fn empty() -> Self {
        Self(SourceRepr::Empty)
    }

    /// A loaded handle.
    #[must_use]
    pub fn ready(handle: SdkHandle) -> Self {
        Self(SourceRepr::Ready(handle))
    }

    /// A future resolving to a handle, or to `None` when no SDK is available.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Option<SdkHandle>, SdkError>> + Send + 'static,
    {
        let boxed: SdkFuture<Option<SdkHandle>> = Box::pin(future);
        Self(SourceRepr::Deferred(Arc::new(boxed.shared())))
    }

    /// Returns `true` for [`HandleSource::empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.0, SourceRepr::Empty)
    }

    /// Returns `true` if both refer to the same handle or the same future.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (SourceRepr::Empty, SourceRepr::Empty) => true,
            (SourceRepr::Ready(a), SourceRepr::Ready(b)) => same_handle(a, b),
            (SourceRepr::Deferred(a), SourceRepr::Deferred(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Validates a ready handle. Empty and deferred sources always pass; a
    /// deferred handle is validated once it resolves.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandleError`] naming `provider` if the handle lacks a
    /// required capability.
    pub fn validate(&self, provider: ProviderKind) -> Result<(), InvalidHandleError> {
        match &self.0 {
            SourceRepr::Ready(handle) if !is_valid_handle(handle.as_ref()) => {
                Err(InvalidHandleError::new(provider))
            }
            _ => Ok(()),
        }
    }

    /// Turns the source into resolver input, validating deferred handles on
    /// arrival. Returns `None` for an empty source.
    pub(crate) fn into_input(self, provider: ProviderKind) -> Option<MaybeAsync<Option<SdkHandle>>> {
        match self.0 {
            SourceRepr::Empty => None,
            SourceRepr::Ready(handle) => Some(MaybeAsync::Ready(Some(handle))),
            SourceRepr::Deferred(shared) => {
                let future = (*shared).clone();
                Some(MaybeAsync::Deferred(Box::pin(async move {
                    match future.await? {
                        Some(handle) if !is_valid_handle(handle.as_ref()) => Err(SdkError::new(
                            InvalidHandleError::new(provider).to_string(),
                        )
                        .with_kind(SdkErrorKind::InvalidHandle)),
                        other => Ok(other),
                    }
                })))
            }
        }
    }
}

impl fmt::Debug for HandleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match &self.0 {
            SourceRepr::Empty => "empty",
            SourceRepr::Ready(_) => "ready",
            SourceRepr::Deferred(_) => "deferred",
        };
        f.debug_tuple("HandleSource").field(&repr).finish()
    }
}

impl From<SdkHandle> for HandleSource {
    fn from(handle: SdkHandle) -> Self {
        Self::ready(handle)
    }
}

impl From<Option<SdkHandle>> for HandleSource {
    fn from(handle: Option<SdkHandle>) -> Self {
        handle.map_or_else(Self::empty, Self::ready)
    }
}

/// Identity comparison of two primary handles.
#[must_use]
pub fn same_handle(a: &SdkHandle, b: &SdkHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
