//! Primary handle double.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use paybind::error::SdkError;
use paybind::resolver::SdkFuture;
use paybind::sdk::{
    Capability, CheckoutSession, ElementsGroup, EmbeddedCheckout, PaymentSdk, REQUIRED_CAPABILITIES,
};
use paybind::{AppInfo, Options};
use tokio::sync::oneshot;

use crate::checkout::{CheckoutOutcome, MockCheckoutSession};
use crate::element::MockElements;
use crate::embedded::MockEmbeddedCheckout;
use crate::{Calls, lock};

/// A recorded primary SDK handle.
pub struct MockSdk {
    capabilities: HashSet<Capability>,
    elements: Calls<Arc<MockElements>>,
    elements_error: Mutex<Option<SdkError>>,
    checkouts: Calls<(Options, Arc<MockCheckoutSession>)>,
    checkout_outcome: Mutex<CheckoutOutcome>,
    checkout_gate: Mutex<Option<oneshot::Receiver<()>>>,
    embedded: Calls<(Options, Arc<MockEmbeddedCheckout>)>,
    embedded_error: Mutex<Option<SdkError>>,
    embedded_gate: Mutex<Option<oneshot::Receiver<()>>>,
    registrations: Calls<AppInfo>,
}

impl fmt::Debug for MockSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSdk")
            .field("capabilities", &self.capabilities)
            .field("elements_calls", &self.elements.len())
            .field("init_checkout_calls", &self.checkouts.len())
            .field("init_embedded_checkout_calls", &self.embedded.len())
            .finish_non_exhaustive()
    }
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSdk {
    /// A handle exposing every capability.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(&[
            Capability::Elements,
            Capability::CreateToken,
            Capability::CreatePaymentMethod,
            Capability::ConfirmCardPayment,
            Capability::InitCheckout,
            Capability::InitEmbeddedCheckout,
            Capability::RegisterWrapper,
        ])
    }

    /// A handle exposing only `capabilities`.
    #[must_use]
    pub fn with_capabilities(capabilities: &[Capability]) -> Self {
        Self {
            capabilities: capabilities.iter().copied().collect(),
            elements: Calls::default(),
            elements_error: Mutex::new(None),
            checkouts: Calls::default(),
            checkout_outcome: Mutex::new(CheckoutOutcome::default()),
            checkout_gate: Mutex::new(None),
            embedded: Calls::default(),
            embedded_error: Mutex::new(None),
            embedded_gate: Mutex::new(None),
            registrations: Calls::default(),
        }
    }

    /// A handle missing a required capability, which providers must reject.
    #[must_use]
    pub fn invalid() -> Self {
        Self::with_capabilities(&REQUIRED_CAPABILITIES[..1])
    }

    /// Every elements group created, oldest first.
    #[must_use]
    pub fn elements_calls(&self) -> Vec<Arc<MockElements>> {
        self.elements.all()
    }

    /// The most recent elements group.
    #[must_use]
    pub fn last_elements(&self) -> Option<Arc<MockElements>> {
        self.elements.last()
    }

    /// Makes `elements` fail with `error`.
    pub fn fail_elements(&self, error: SdkError) {
        *lock(&self.elements_error) = Some(error);
    }

    /// Options of every `init_checkout` call.
    #[must_use]
    pub fn init_checkout_calls(&self) -> Vec<Options> {
        self.checkouts.all().into_iter().map(|(o, _)| o).collect()
    }

    /// The most recent checkout session.
    #[must_use]
    pub fn last_checkout(&self) -> Option<Arc<MockCheckoutSession>> {
        self.checkouts.last().map(|(_, s)| s)
    }

    /// Sets how the next checkout initialization ends.
    pub fn set_checkout_outcome(&self, outcome: CheckoutOutcome) {
        *lock(&self.checkout_outcome) = outcome;
    }

    /// Holds the next `init_checkout` open until the returned sender fires.
    #[must_use]
    pub fn gate_checkout(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.checkout_gate) = Some(rx);
        tx
    }

    /// Options of every `init_embedded_checkout` call.
    #[must_use]
    pub fn init_embedded_checkout_calls(&self) -> Vec<Options> {
        self.embedded.all().into_iter().map(|(o, _)| o).collect()
    }

    /// The most recent embedded checkout.
    #[must_use]
    pub fn last_embedded_checkout(&self) -> Option<Arc<MockEmbeddedCheckout>> {
        self.embedded.last().map(|(_, c)| c)
    }

    /// Makes `init_embedded_checkout` reject with `error`.
    pub fn fail_embedded_checkout(&self, error: SdkError) {
        *lock(&self.embedded_error) = Some(error);
    }

    /// Holds the next `init_embedded_checkout` open until the returned sender
    /// fires.
    #[must_use]
    pub fn gate_embedded_checkout(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.embedded_gate) = Some(rx);
        tx
    }

    /// App info passed to `register_wrapper`.
    #[must_use]
    pub fn registrations(&self) -> Vec<AppInfo> {
        self.registrations.all()
    }
}

async fn open(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate {
        // A dropped sender releases the gate too.
        let _ = gate.await;
    }
}

impl PaymentSdk for MockSdk {
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn elements(&self, options: &Options) -> Result<Arc<dyn ElementsGroup>, SdkError> {
        if let Some(error) = lock(&self.elements_error).clone() {
            return Err(error);
        }
        let group = Arc::new(MockElements::new(options.clone()));
        self.elements.push(Arc::clone(&group));
        Ok(group)
    }

    fn init_checkout(&self, options: &Options) -> SdkFuture<Arc<dyn CheckoutSession>> {
        if !self.supports(Capability::InitCheckout) {
            return Box::pin(async { Err(SdkError::unsupported("init_checkout")) });
        }
        let outcome = lock(&self.checkout_outcome).clone();
        let gate = lock(&self.checkout_gate).take();
        let session = Arc::new(MockCheckoutSession::new(outcome.clone()));
        self.checkouts.push((options.clone(), Arc::clone(&session)));
        Box::pin(async move {
            open(gate).await;
            match outcome {
                CheckoutOutcome::Rejected(error) => Err(error),
                _ => Ok(session as Arc<dyn CheckoutSession>),
            }
        })
    }

    fn init_embedded_checkout(&self, options: &Options) -> SdkFuture<Arc<dyn EmbeddedCheckout>> {
        if !self.supports(Capability::InitEmbeddedCheckout) {
            return Box::pin(async { Err(SdkError::unsupported("init_embedded_checkout")) });
        }
        let error = lock(&self.embedded_error).clone();
        let gate = lock(&self.embedded_gate).take();
        let checkout = Arc::new(MockEmbeddedCheckout::new(options.clone()));
        self.embedded.push((options.clone(), Arc::clone(&checkout)));
        Box::pin(async move {
            open(gate).await;
            match error {
                Some(error) => Err(error),
                None => Ok(checkout as Arc<dyn EmbeddedCheckout>),
            }
        })
    }

    fn register_wrapper(&self, info: &AppInfo) -> Result<(), SdkError> {
        if !self.supports(Capability::RegisterWrapper) {
            return Err(SdkError::unsupported("register_wrapper"));
        }
        self.registrations.push(info.clone());
        Ok(())
    }
}
