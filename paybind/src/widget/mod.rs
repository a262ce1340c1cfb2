//! Widget lifecycle.
//!
//! A [`WidgetController`] binds one SDK widget to one DOM node for the
//! lifetime of one component instance:
//!
//! 1. [`WidgetController::new`] checks that a provider is in scope and that it
//!    can host the variant.
//! 2. [`attach`](WidgetController::attach) supplies the node. The widget is
//!    created, its events bound, and mounted as soon as the provider's
//!    secondary object exists; until then every provider change retries.
//! 3. [`render`](WidgetController::render) pushes new props: callbacks are
//!    swapped in place and safe option changes are applied.
//! 4. [`unmount`](WidgetController::unmount) (or drop) destroys the widget
//!    exactly once.

mod events;
mod kind;

pub mod embedded;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::{Scope, WidgetHost};
use crate::diagnostics::DiagnosticSink;
use crate::diff::OptionsDiff;
use crate::error::{BindingError, WidgetError};
use crate::options::Options;
use crate::provider::spawn_in_span;
use crate::resolver::Liveness;
use crate::sdk::{CheckoutSession, DomNode, Element, ElementsGroup};

pub use embedded::EmbeddedCheckoutMount;
pub use events::{Callback, ElementEvent, EventArgument, EventBindingTable};
pub use kind::{CheckoutFactory, ElementKind, IMMUTABLE_WIDGET_OPTIONS, ReadyArgument};

/// Props of one widget render pass.
#[derive(Debug, Clone, Default)]
pub struct WidgetProps {
    /// Widget options.
    pub options: Options,
    /// Event callbacks.
    pub handlers: BTreeMap<ElementEvent, Callback>,
}

impl WidgetProps {
    /// Empty props.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Sets the callback for `event`.
    #[must_use]
    pub fn on(self, event: ElementEvent, f: impl Fn(EventArgument) + Send + Sync + 'static) -> Self {
        self.with_handler(event, Callback::new(f))
    }

    /// Sets an existing callback for `event`.
    #[must_use]
    pub fn with_handler(mut self, event: ElementEvent, callback: Callback) -> Self {
        self.handlers.insert(event, callback);
        self
    }
}

/// Lifecycle state of a widget.
#[derive(Debug, Clone)]
pub enum WidgetStatus {
    /// No node attached yet.
    Detached,
    /// Node attached, waiting for the provider.
    Waiting,
    /// The SDK is creating and mounting the widget.
    Creating,
    /// The widget is live.
    Mounted,
    /// Creation or mounting failed.
    Failed(WidgetError),
    /// Unmounted.
    Destroyed,
}

/// Where a widget gets created.
enum Factory {
    Group(Arc<dyn ElementsGroup>),
    Session(Arc<dyn CheckoutSession>),
}

impl Factory {
    fn from_host(host: &WidgetHost) -> Option<Self> {
        match host {
            WidgetHost::Elements(context) => context.secondary().map(Self::Group),
            WidgetHost::Checkout(context) => context.secondary().map(Self::Session),
        }
    }

    fn create(&self, kind: ElementKind, options: &Options) -> Result<Arc<dyn Element>, WidgetError> {
        let created = match self {
            Self::Group(group) => group.create(kind, options),
            Self::Session(session) => {
                let (factory, options) = kind.checkout_factory(options)?;
                factory.create(session.as_ref(), &options)
            }
        };
        created.map_err(|error| WidgetError::Create { kind, error })
    }
}

struct WidgetState {
    key: Option<String>,
    node: Option<DomNode>,
    props: WidgetProps,
    applied: Option<Options>,
    element: Option<Arc<dyn Element>>,
    bindings: EventBindingTable,
    status: WidgetStatus,
    generation: u64,
    watcher: Option<Liveness>,
}

struct Inner {
    kind: ElementKind,
    host: WidgetHost,
    diff: OptionsDiff,
    diagnostics: Arc<dyn DiagnosticSink>,
    state: Mutex<WidgetState>,
}

/// Lifecycle controller for one widget.
pub struct WidgetController {
    inner: Arc<Inner>,
}

impl fmt::Debug for WidgetController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("WidgetController")
            .field("kind", &self.inner.kind)
            .field("host", &self.inner.host.kind())
            .field("status", &state.status)
            .field("bindings", &state.bindings)
            .finish_non_exhaustive()
    }
}

impl WidgetController {
    /// Creates a controller for a widget of `kind` inside `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::MissingProvider`] or
    /// [`BindingError::ConflictingProvider`] if `scope` does not contain
    /// exactly one of the Elements and Checkout providers, and
    /// [`BindingError::Widget`] if a checkout provider cannot host `kind`.
    pub fn new(scope: &Scope, kind: ElementKind, props: WidgetProps) -> Result<Self, BindingError> {
        let host = scope.elements_or_checkout(&format!("mounts <{kind}>"))?;

        let mut diff = OptionsDiff::new(kind.component_name());
        for key in IMMUTABLE_WIDGET_OPTIONS {
            diff = diff.immutable(key);
        }
        if matches!(host, WidgetHost::Checkout(_)) {
            kind.checkout_factory(&props.options)?;
            if kind == ElementKind::Address {
                diff = diff.immutable("mode");
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                kind,
                diagnostics: host.diagnostics(),
                host,
                diff,
                state: Mutex::new(WidgetState {
                    key: None,
                    node: None,
                    props,
                    applied: None,
                    element: None,
                    bindings: EventBindingTable::new(),
                    status: WidgetStatus::Detached,
                    generation: 0,
                    watcher: None,
                }),
            }),
        })
    }

    /// The widget variant.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.inner.kind
    }

    /// Attaches the mount node and creates the widget once possible.
    ///
    /// A second call is ignored; a widget never moves between nodes.
    pub fn attach(&self, node: DomNode) {
        {
            let mut state = self.inner.lock();
            if state.node.is_some() || matches!(state.status, WidgetStatus::Destroyed) {
                return;
            }
            state.node = Some(node);
            state.status = WidgetStatus::Waiting;
        }
        if !self.inner.try_materialize() {
            self.inner.watch_host();
        }
    }

    /// Applies the props of a new render pass.
    pub fn render(&self, props: WidgetProps) {
        let pending = {
            let mut state = self.inner.lock();
            if matches!(state.status, WidgetStatus::Destroyed) {
                return;
            }
            state.props = props;
            state.element.is_none()
        };
        if pending {
            self.inner.try_materialize();
        } else {
            self.inner.reconcile();
        }
    }

    /// Changes the identity key. A different key destroys the current widget
    /// and creates a fresh one in the same node.
    pub fn set_key(&self, key: impl Into<String>) {
        let key = key.into();
        let retired = {
            let mut state = self.inner.lock();
            if matches!(state.status, WidgetStatus::Destroyed) {
                return;
            }
            let previous = state.key.replace(key.clone());
            if previous.is_none() || previous.as_deref() == Some(key.as_str()) {
                return;
            }
            tracing::debug!(widget = %self.inner.kind, "key changed, remounting widget");
            state.generation += 1;
            state.applied = None;
            state.status = if state.node.is_some() {
                WidgetStatus::Waiting
            } else {
                WidgetStatus::Detached
            };
            let element = state.element.take();
            let bindings = std::mem::take(&mut state.bindings);
            element.map(|element| (element, bindings))
        };

        if let Some((element, mut bindings)) = retired {
            bindings.clear(&element);
            destroy_quietly(self.inner.kind, &element);
        }
        let attached = self.inner.lock().node.is_some();
        if attached && !self.inner.try_materialize() {
            self.inner.watch_host();
        }
    }

    /// Destroys the widget. Later calls do nothing.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// The SDK widget, once created.
    #[must_use]
    pub fn element(&self) -> Option<Arc<dyn Element>> {
        self.inner.lock().element.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> WidgetStatus {
        self.inner.lock().status.clone()
    }
}

impl Drop for WidgetController {
    fn drop(&mut self) {
        self.inner.unmount();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and mounts the widget if everything it needs is there.
    ///
    /// Returns `false` while it is worth retrying on the next provider change.
    fn try_materialize(&self) -> bool {
        let (factory, node, options, handlers, generation) = {
            let mut state = self.lock();
            match state.status {
                WidgetStatus::Detached | WidgetStatus::Waiting => {}
                _ => return true,
            }
            let Some(node) = state.node.clone() else {
                return false;
            };
            let Some(factory) = Factory::from_host(&self.host) else {
                return false;
            };
            state.status = WidgetStatus::Creating;
            (
                factory,
                node,
                state.props.options.clone(),
                state.props.handlers.clone(),
                state.generation,
            )
        };

        let element = match factory.create(self.kind, &options) {
            Ok(element) => element,
            Err(error) => {
                tracing::warn!(widget = %self.kind, %error, "widget creation failed");
                let mut state = self.lock();
                if state.generation == generation {
                    state.status = WidgetStatus::Failed(error);
                }
                return true;
            }
        };

        // Bound before mounting so an immediate ready event is delivered.
        let ready = self.kind.ready_argument();
        let mut bindings = EventBindingTable::new();
        bindings.sync(&element, &handlers, ready);
        let mounted = element.mount(&node);

        {
            let mut state = self.lock();
            if state.generation == generation {
                let WidgetState {
                    props,
                    bindings: slot,
                    ..
                } = &mut *state;
                bindings.sync(&element, &props.handlers, ready);
                *slot = bindings;
                state.element = Some(Arc::clone(&element));
                state.applied = Some(options);
                state.status = match mounted {
                    Ok(()) => WidgetStatus::Mounted,
                    Err(error) => {
                        tracing::warn!(widget = %self.kind, %error, "widget mount failed");
                        WidgetStatus::Failed(WidgetError::Mount {
                            kind: self.kind,
                            error,
                        })
                    }
                };
                tracing::debug!(widget = %self.kind, node = node.id(), "widget created");
            } else {
                drop(state);
                tracing::debug!(widget = %self.kind, "widget superseded during creation");
                bindings.clear(&element);
                destroy_quietly(self.kind, &element);
                return true;
            }
        }

        // Props may have moved on while the SDK was busy.
        self.reconcile();
        true
    }

    fn reconcile(&self) {
        let (element, updates) = {
            let mut state = self.lock();
            let Some(element) = state.element.clone() else {
                return;
            };
            let WidgetState {
                props,
                bindings,
                applied,
                ..
            } = &mut *state;
            bindings.sync(&element, &props.handlers, self.kind.ready_argument());
            let updates = self
                .diff
                .diff(&props.options, applied.as_ref(), self.diagnostics.as_ref());
            *applied = Some(props.options.clone());
            (element, updates)
        };
        if let Some(updates) = updates {
            element.update(&updates);
        }
    }

    fn watch_host(self: &Arc<Self>) {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!(widget = %self.kind, "no runtime, widget creation waits for the next render");
            return;
        }
        let token = Liveness::new();
        if let Some(previous) = self.lock().watcher.replace(token.clone()) {
            previous.revoke();
        }
        let weak = Arc::downgrade(self);
        let mut host = self.host.clone();
        spawn_in_span(
            async move {
                while token.is_alive() && host.changed().await {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    if !token.is_alive() || inner.try_materialize() {
                        break;
                    }
                }
            },
            tracing::debug_span!("paybind.widget.materialize", widget = %self.kind),
        );
    }

    fn unmount(&self) {
        let retired = {
            let mut state = self.lock();
            if matches!(state.status, WidgetStatus::Destroyed) {
                return;
            }
            state.status = WidgetStatus::Destroyed;
            state.generation += 1;
            if let Some(watcher) = state.watcher.take() {
                watcher.revoke();
            }
            let element = state.element.take();
            let bindings = std::mem::take(&mut state.bindings);
            element.map(|element| (element, bindings))
        };
        if let Some((element, mut bindings)) = retired {
            bindings.clear(&element);
            destroy_quietly(self.kind, &element);
        }
        tracing::debug!(widget = %self.kind, "widget unmounted");
    }
}

/// Destroys `element`, logging instead of failing. A parent provider may have
/// invalidated it already.
fn destroy_quietly(kind: ElementKind, element: &Arc<dyn Element>) {
    if let Err(error) = element.destroy() {
        tracing::debug!(widget = %kind, %error, "widget destroy failed");
    }
}
