//! Widget event bindings.
//!
//! Each bound event is registered with the SDK exactly once, through a
//! trampoline that reads the current callback from a shared cell at delivery
//! time. Replacing a callback only swaps the cell; the SDK registration is
//! touched when a handler appears or disappears.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sdk::{Element, EventListener, ListenerId};

use super::kind::ReadyArgument;

/// Events a widget can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ElementEvent {
    Blur,
    Focus,
    Ready,
    Change,
    Escape,
    Click,
    LoadError,
    LoaderStart,
    NetworksChange,
    Confirm,
    Cancel,
    ShippingAddressChange,
    ShippingRateChange,
    SavedPaymentMethodRemove,
    SavedPaymentMethodUpdate,
}

impl ElementEvent {
    /// Event name on the SDK side.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::Focus => "focus",
            Self::Ready => "ready",
            Self::Change => "change",
            Self::Escape => "escape",
            Self::Click => "click",
            Self::LoadError => "loaderror",
            Self::LoaderStart => "loaderstart",
            Self::NetworksChange => "networkschange",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::ShippingAddressChange => "shippingaddresschange",
            Self::ShippingRateChange => "shippingratechange",
            Self::SavedPaymentMethodRemove => "savedpaymentmethodremove",
            Self::SavedPaymentMethodUpdate => "savedpaymentmethodupdate",
        }
    }
}

impl fmt::Display for ElementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a callback receives.
#[derive(Clone)]
pub enum EventArgument {
    /// The SDK event payload.
    Event(Value),
    /// The widget itself (ready callbacks of most variants).
    Widget(Arc<dyn Element>),
}

impl EventArgument {
    /// The payload, if this is an event.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Event(payload) => Some(payload),
            Self::Widget(_) => None,
        }
    }
}

impl fmt::Debug for EventArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(payload) => f.debug_tuple("Event").field(payload).finish(),
            Self::Widget(_) => f.write_str("Widget(..)"),
        }
    }
}

/// A consumer callback.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(EventArgument) + Send + Sync>);

impl Callback {
    /// Wraps a closure.
    pub fn new(f: impl Fn(EventArgument) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn call(&self, argument: EventArgument) {
        (self.0)(argument);
    }

    /// Returns `true` if both wrap the same closure.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

struct Binding {
    cell: Arc<Mutex<Callback>>,
    listener: ListenerId,
}

/// The callbacks currently registered on one widget.
#[derive(Default)]
pub struct EventBindingTable {
    bindings: BTreeMap<ElementEvent, Binding>,
}

impl fmt::Debug for EventBindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bindings.keys()).finish()
    }
}

impl EventBindingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the registrations on `element` match `handlers`.
    pub fn sync(
        &mut self,
        element: &Arc<dyn Element>,
        handlers: &BTreeMap<ElementEvent, Callback>,
        ready: ReadyArgument,
    ) {
        self.bindings.retain(|event, binding| {
            let keep = handlers.contains_key(event);
            if !keep {
                tracing::trace!(%event, "unbinding widget event");
                element.off(*event, binding.listener);
            }
            keep
        });

        for (event, callback) in handlers {
            if let Some(binding) = self.bindings.get(event) {
                *binding.cell.lock().unwrap_or_else(PoisonError::into_inner) = callback.clone();
                continue;
            }
            tracing::trace!(%event, "binding widget event");
            let cell = Arc::new(Mutex::new(callback.clone()));
            let listener = element.on(*event, trampoline(*event, &cell, element, ready));
            self.bindings.insert(*event, Binding { cell, listener });
        }
    }

    /// Removes every registration from `element`.
    pub fn clear(&mut self, element: &Arc<dyn Element>) {
        for (event, binding) in std::mem::take(&mut self.bindings) {
            element.off(event, binding.listener);
        }
    }

    /// Number of bound events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Returns `true` if `event` is bound.
    #[must_use]
    pub fn is_bound(&self, event: ElementEvent) -> bool {
        self.bindings.contains_key(&event)
    }
}

fn trampoline(
    event: ElementEvent,
    cell: &Arc<Mutex<Callback>>,
    element: &Arc<dyn Element>,
    ready: ReadyArgument,
) -> EventListener {
    let cell = Arc::clone(cell);
    let widget = Arc::downgrade(element);
    Arc::new(move |payload: &Value| {
        let callback = cell.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let argument = if event == ElementEvent::Ready && ready == ReadyArgument::Widget {
            match widget.upgrade() {
                Some(widget) => EventArgument::Widget(widget),
                None => return,
            }
        } else {
            EventArgument::Event(payload.clone())
        };
        callback.call(argument);
    })
}
