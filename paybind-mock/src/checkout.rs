//! Checkout session doubles.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use paybind::error::SdkError;
use paybind::resolver::SdkFuture;
use paybind::sdk::{CheckoutActions, CheckoutSession, Element, EventListener, ListenerId, LoadActionsResult};
use paybind::{OptionValue, Options};
use serde_json::{Value, json};

use crate::element::MockElement;
use crate::{Calls, lock};

/// How a mocked checkout initialization ends.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// `load_actions` succeeds with this session snapshot.
    Ready(Value),
    /// `init_checkout` rejects.
    Rejected(SdkError),
    /// `load_actions` answers with this error payload.
    ErrorPayload(Value),
}

impl Default for CheckoutOutcome {
    fn default() -> Self {
        Self::Ready(json!({"id": "cs_mock", "total": {"total": 0}}))
    }
}

/// Loaded checkout actions.
#[derive(Debug)]
pub struct MockCheckoutActions {
    session: Mutex<Value>,
}

impl MockCheckoutActions {
    /// Creates actions reporting `session`.
    #[must_use]
    pub fn new(session: Value) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

impl CheckoutActions for MockCheckoutActions {
    fn session(&self) -> Value {
        lock(&self.session).clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A recorded checkout session.
pub struct MockCheckoutSession {
    outcome: CheckoutOutcome,
    next_listener: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, EventListener)>>,
    load_actions_calls: AtomicU64,
    appearance: Calls<Value>,
    fonts: Calls<Value>,
    created: Calls<(&'static str, Options, Arc<MockElement>)>,
}

impl fmt::Debug for MockCheckoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCheckoutSession")
            .field("outcome", &self.outcome)
            .field("change_listeners", &self.change_listener_count())
            .field("created", &self.created.len())
            .finish_non_exhaustive()
    }
}

impl MockCheckoutSession {
    /// Creates a session that ends initialization with `outcome`.
    #[must_use]
    pub fn new(outcome: CheckoutOutcome) -> Self {
        Self {
            outcome,
            next_listener: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            load_actions_calls: AtomicU64::new(0),
            appearance: Calls::default(),
            fonts: Calls::default(),
            created: Calls::default(),
        }
    }

    /// Notifies every `change` listener.
    pub fn emit_change(&self, session: &Value) {
        let listeners: Vec<EventListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(session);
        }
    }

    /// Registered `change` listeners.
    #[must_use]
    pub fn change_listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Number of `load_actions` calls.
    #[must_use]
    pub fn load_actions_calls(&self) -> u64 {
        self.load_actions_calls.load(Ordering::SeqCst)
    }

    /// Arguments of `change_appearance` calls.
    #[must_use]
    pub fn appearance_calls(&self) -> Vec<Value> {
        self.appearance.all()
    }

    /// Arguments of `load_fonts` calls.
    #[must_use]
    pub fn font_calls(&self) -> Vec<Value> {
        self.fonts.all()
    }

    /// Factory calls as `(factory, options)`, oldest first.
    #[must_use]
    pub fn factory_calls(&self) -> Vec<(&'static str, Options)> {
        self.created
            .all()
            .into_iter()
            .map(|(factory, options, _)| (factory, options))
            .collect()
    }

    /// Every widget created, oldest first.
    #[must_use]
    pub fn created(&self) -> Vec<Arc<MockElement>> {
        self.created.all().into_iter().map(|(.., e)| e).collect()
    }

    fn create(&self, factory: &'static str, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        let element = Arc::new(MockElement::new(factory, options.clone()));
        self.created.push((factory, options.clone(), Arc::clone(&element)));
        Ok(element)
    }
}

impl CheckoutSession for MockCheckoutSession {
    fn load_actions(&self) -> SdkFuture<LoadActionsResult> {
        self.load_actions_calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.outcome {
            CheckoutOutcome::Ready(session) => {
                LoadActionsResult::Success(Arc::new(MockCheckoutActions::new(session.clone())))
            }
            CheckoutOutcome::ErrorPayload(payload) => LoadActionsResult::Error(payload.clone()),
            CheckoutOutcome::Rejected(error) => {
                let error = error.clone();
                return Box::pin(async move { Err(error) });
            }
        };
        Box::pin(async move { Ok(result) })
    }

    fn on_change(&self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        lock(&self.listeners).push((id, listener));
        id
    }

    fn off_change(&self, listener: ListenerId) {
        lock(&self.listeners).retain(|(id, _)| *id != listener);
    }

    fn change_appearance(&self, appearance: &OptionValue) {
        self.appearance.push(appearance.to_json());
    }

    fn load_fonts(&self, fonts: &OptionValue) {
        self.fonts.push(fonts.to_json());
    }

    fn create_payment_element(&self, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        self.create("payment", options)
    }

    fn create_billing_address_element(&self, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        self.create("billingAddress", options)
    }

    fn create_shipping_address_element(&self, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        self.create("shippingAddress", options)
    }

    fn create_express_checkout_element(&self, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        self.create("expressCheckout", options)
    }

    fn create_currency_selector_element(&self) -> Result<Arc<dyn Element>, SdkError> {
        self.create("currencySelector", &Options::new())
    }

    fn create_tax_id_element(&self, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        self.create("taxId", options)
    }
}
