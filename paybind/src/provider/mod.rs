//! Provider state machine.
//!
//! A [`Provider`] owns one primary SDK handle and the secondary object created
//! from it. The generic machine lives here; what differs between provider
//! families (which SDK call creates the secondary object, which options are
//! immutable, how updates are routed) is supplied by a [`ProviderFlavor`]:
//!
//! - [`elements::ElementsFlavor`]
//! - [`checkout::CheckoutFlavor`]
//! - [`embedded::EmbeddedCheckoutFlavor`]
//!
//! ```text
//! Uninitialized -> AwaitingPrimary -> AwaitingConfiguration -> InitializingSecondary -> Ready
//!                        |                                            |
//!                        +------------------> Failed <----------------+
//! ```
//!
//! The machine publishes a [`ProviderContextValue`] through a `watch` channel.
//! Descendants read it through a [`ProviderContext`].

pub mod checkout;
pub mod elements;
pub mod embedded;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::config::ProviderConfig;
use crate::diagnostics::{DiagnosticSink, UnsupportedMutation};
use crate::error::{InitializationFailure, InvalidHandleError, SdkErrorKind};
use crate::options::Options;
use crate::resolver::{AsyncHandle, AsyncResolver, Liveness, MaybeAsync};
use crate::sdk::{HandleSource, SdkHandle, Subscription};

pub use checkout::{CheckoutContext, CheckoutFlavor, CheckoutProvider, CheckoutState};
pub use elements::{ElementsContext, ElementsFlavor, ElementsProvider};
pub use embedded::{EmbeddedCheckoutContext, EmbeddedCheckoutFlavor, EmbeddedCheckoutProvider};

/// Provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Widget factory provider.
    Elements,
    /// Checkout session provider.
    Checkout,
    /// Embedded checkout provider.
    EmbeddedCheckout,
}

impl ProviderKind {
    /// Component name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Elements => "Elements",
            Self::Checkout => "CheckoutProvider",
            Self::EmbeddedCheckout => "EmbeddedCheckoutProvider",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a provider.
#[derive(Debug, Clone, Default)]
pub enum ProviderStatus {
    /// No handle has been supplied yet.
    #[default]
    Uninitialized,
    /// The handle future is pending, or resolved to nothing.
    AwaitingPrimary,
    /// The handle is known but the options do not allow initialization yet.
    AwaitingConfiguration,
    /// The one-shot initialization call is in flight.
    InitializingSecondary,
    /// The secondary object is available.
    Ready,
    /// Resolution or initialization failed. Not retried.
    Failed(InitializationFailure),
}

impl ProviderStatus {
    /// Returns `true` in the [`Ready`](Self::Ready) state.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&InitializationFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// What a provider publishes to its descendants.
#[derive(Clone)]
pub struct ProviderContextValue<S, D> {
    /// Lifecycle state.
    pub status: ProviderStatus,
    /// The accepted primary handle, once resolved.
    pub primary: Option<SdkHandle>,
    /// The secondary object, once initialized.
    pub secondary: Option<S>,
    /// Flavor-specific derived state.
    pub derived: D,
}

impl<S, D: Default> Default for ProviderContextValue<S, D> {
    fn default() -> Self {
        Self {
            status: ProviderStatus::Uninitialized,
            primary: None,
            secondary: None,
            derived: D::default(),
        }
    }
}

impl<S, D: fmt::Debug> fmt::Debug for ProviderContextValue<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContextValue")
            .field("status", &self.status)
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.is_some())
            .field("derived", &self.derived)
            .finish()
    }
}

/// Read side of a provider, handed to descendants.
pub struct ProviderContext<S, D> {
    rx: watch::Receiver<ProviderContextValue<S, D>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<S, D> Clone for ProviderContext<S, D> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            diagnostics: Arc::clone(&self.diagnostics),
        }
    }
}

impl<S, D: fmt::Debug> fmt::Debug for ProviderContext<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderContext")
            .field(&*self.rx.borrow())
            .finish()
    }
}

impl<S: Clone, D: Clone> ProviderContext<S, D> {
    /// Snapshot of the published value.
    #[must_use]
    pub fn current(&self) -> ProviderContextValue<S, D> {
        self.rx.borrow().clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ProviderStatus {
        self.rx.borrow().status.clone()
    }

    /// The primary handle, once resolved.
    #[must_use]
    pub fn primary(&self) -> Option<SdkHandle> {
        self.rx.borrow().primary.clone()
    }

    /// The secondary object, once initialized.
    #[must_use]
    pub fn secondary(&self) -> Option<S> {
        self.rx.borrow().secondary.clone()
    }

    /// The derived state.
    #[must_use]
    pub fn derived(&self) -> D {
        self.rx.borrow().derived.clone()
    }

    /// Sink for warnings raised by descendants of this provider.
    #[must_use]
    pub fn diagnostics(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.diagnostics)
    }

    /// Waits for the next published change.
    ///
    /// Returns `false` once the provider is gone and no change can follow.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// A successful initialization.
#[derive(Debug, Clone)]
pub struct Initialized<S, D> {
    /// The secondary object.
    pub secondary: S,
    /// Initial derived state.
    pub derived: D,
}

/// Outcome of a flavor's initialization call.
pub type InitResult<S, D> = Result<Initialized<S, D>, InitializationFailure>;

/// Initialization that completed synchronously or will complete later.
pub enum Initialization<S, D> {
    /// Already complete.
    Complete(InitResult<S, D>),
    /// Completes when the future does.
    Pending(BoxFuture<'static, InitResult<S, D>>),
}

impl<S, D> fmt::Debug for Initialization<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(r) => f
                .debug_tuple("Initialization::Complete")
                .field(&r.is_ok())
                .finish(),
            Self::Pending(_) => f.write_str("Initialization::Pending(..)"),
        }
    }
}

/// Publishes derived-state changes from SDK notifications.
///
/// Publishing stops silently once the provider is unmounted.
pub struct DerivedPublisher<S, D> {
    context: Arc<watch::Sender<ProviderContextValue<S, D>>>,
    live: Liveness,
}

impl<S, D> Clone for DerivedPublisher<S, D> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            live: self.live.clone(),
        }
    }
}

impl<S, D> fmt::Debug for DerivedPublisher<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedPublisher")
            .field("live", &self.live.is_alive())
            .finish()
    }
}

impl<S, D> DerivedPublisher<S, D> {
    /// Applies `update` to the derived state and notifies descendants.
    pub fn publish(&self, update: impl FnOnce(&mut D)) {
        if !self.live.is_alive() {
            tracing::trace!("provider unmounted, dropping derived update");
            return;
        }
        self.context.send_modify(|value| update(&mut value.derived));
    }
}

/// What distinguishes one provider family from another.
pub trait ProviderFlavor: Send + Sync + 'static {
    /// The secondary SDK object.
    type Secondary: Clone + Send + Sync + 'static;
    /// State derived from the secondary object and republished on change.
    type Derived: Clone + Default + fmt::Debug + Send + Sync + 'static;

    /// Which family this is.
    const KIND: ProviderKind;

    /// Returns `false` while `options` lack something initialization needs.
    fn ready_to_initialize(&self, _options: &Options) -> bool {
        true
    }

    /// Issues the one-shot initialization call.
    fn initialize(
        &self,
        sdk: &SdkHandle,
        options: &Options,
    ) -> Initialization<Self::Secondary, Self::Derived>;

    /// Pushes the safe subset of an options change to the secondary object.
    fn apply_updates(
        &self,
        secondary: &Self::Secondary,
        next: &Options,
        previous: &Options,
        sink: &dyn DiagnosticSink,
    );

    /// Subscribes to change notifications of the secondary object.
    fn subscribe(
        &self,
        _secondary: &Self::Secondary,
        _publisher: DerivedPublisher<Self::Secondary, Self::Derived>,
    ) -> Option<Subscription> {
        None
    }

    /// Releases a secondary object the provider no longer needs.
    ///
    /// Also called for objects that arrive after the provider was unmounted.
    fn teardown(_secondary: &Self::Secondary) {}
}

struct MachineState {
    accepted: Option<HandleSource>,
    last_rejected: Option<HandleSource>,
    latest: Options,
    applied: Option<Options>,
    subscription: Option<Subscription>,
}

struct Shared<F: ProviderFlavor> {
    flavor: F,
    config: ProviderConfig,
    context: Arc<watch::Sender<ProviderContextValue<F::Secondary, F::Derived>>>,
    resolver: AsyncResolver<Option<SdkHandle>>,
    live: Liveness,
    init_issued: AtomicBool,
    state: Mutex<MachineState>,
}

/// A mounted provider.
///
/// Dropping it is the unmount: subscriptions are released, in-flight work is
/// ignored when it lands, and the secondary object is torn down.
pub struct Provider<F: ProviderFlavor> {
    shared: Arc<Shared<F>>,
}

impl<F: ProviderFlavor> fmt::Debug for Provider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &F::KIND)
            .field("status", &self.status())
            .field("live", &self.shared.live.is_alive())
            .finish_non_exhaustive()
    }
}

impl<F: ProviderFlavor> Provider<F> {
    /// Mounts a provider and renders it for the first time.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandleError`] if `source` is a ready handle that fails
    /// validation.
    ///
    /// # Panics
    ///
    /// Panics if a deferred source or an asynchronous initialization is started
    /// outside a Tokio runtime.
    pub fn mount(
        flavor: F,
        source: HandleSource,
        options: Options,
        config: ProviderConfig,
    ) -> Result<Self, InvalidHandleError> {
        source.validate(F::KIND)?;

        let (context, _) = watch::channel(ProviderContextValue::default());
        let shared = Arc::new(Shared {
            flavor,
            config,
            context: Arc::new(context),
            resolver: AsyncResolver::new(),
            live: Liveness::new(),
            init_issued: AtomicBool::new(false),
            state: Mutex::new(MachineState {
                accepted: None,
                last_rejected: None,
                latest: Options::new(),
                applied: None,
                subscription: None,
            }),
        });
        tracing::debug!(provider = %F::KIND, "provider mounted");
        shared.render(source, options);
        Ok(Self { shared })
    }

    /// Re-renders with the props of the current pass.
    ///
    /// A handle different from the accepted one is ignored with a warning.
    /// Option changes are diffed and applied once the secondary object exists.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandleError`] if `source` is a ready handle that fails
    /// validation.
    pub fn render(&self, source: HandleSource, options: Options) -> Result<(), InvalidHandleError> {
        source.validate(F::KIND)?;
        self.shared.render(source, options);
        Ok(())
    }

    /// Read side for descendants.
    #[must_use]
    pub fn context(&self) -> ProviderContext<F::Secondary, F::Derived> {
        ProviderContext {
            rx: self.shared.context.subscribe(),
            diagnostics: Arc::clone(&self.shared.config.diagnostics),
        }
    }

    /// Snapshot of the published value.
    #[must_use]
    pub fn current(&self) -> ProviderContextValue<F::Secondary, F::Derived> {
        self.shared.context.borrow().clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ProviderStatus {
        self.shared.context.borrow().status.clone()
    }

    /// Unmounts the provider.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<F: ProviderFlavor> Drop for Provider<F> {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl<F: ProviderFlavor> Shared<F> {
    fn lock(&self) -> std::sync::MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ProviderStatus) {
        tracing::debug!(provider = %F::KIND, ?status, "provider status changed");
        self.context.send_modify(|value| value.status = status);
    }

    fn render(self: &Arc<Self>, source: HandleSource, options: Options) {
        if !self.live.is_alive() {
            return;
        }
        let begin = {
            let mut state = self.lock();
            state.latest = options;
            self.accept(&mut state, source)
        };
        if let Some(source) = begin {
            self.start_resolution(source);
        }
        self.maybe_initialize();
        self.reconcile_options();
    }

    /// Assign-once handle acceptance. Returns the source to start resolving.
    fn accept(&self, state: &mut MachineState, source: HandleSource) -> Option<HandleSource> {
        match &state.accepted {
            None if source.is_empty() => None,
            None => {
                state.accepted = Some(source.clone());
                Some(source)
            }
            Some(accepted) if accepted.same_as(&source) => None,
            Some(_) => {
                let repeated = state
                    .last_rejected
                    .as_ref()
                    .is_some_and(|rejected| rejected.same_as(&source));
                if !repeated {
                    self.config
                        .diagnostics
                        .unsupported_mutation(&UnsupportedMutation::handle(F::KIND.name()));
                    state.last_rejected = Some(source);
                }
                None
            }
        }
    }

    fn start_resolution(self: &Arc<Self>, source: HandleSource) {
        let Some(input) = source.into_input(F::KIND) else {
            return;
        };
        self.set_status(ProviderStatus::AwaitingPrimary);

        match input {
            MaybeAsync::Ready(handle) => {
                self.resolver.resolve(MaybeAsync::Ready(handle));
                self.on_primary(self.resolver.current());
            }
            deferred @ MaybeAsync::Deferred(_) => {
                let mut rx = self.resolver.subscribe();
                self.resolver.resolve(deferred);
                let weak = Arc::downgrade(self);
                spawn_in_span(
                    async move {
                        let settled = match rx.wait_for(|h| !h.is_pending()).await {
                            Ok(handle) => handle.clone(),
                            Err(_) => return,
                        };
                        if let Some(shared) = weak.upgrade() {
                            shared.on_primary(settled);
                        }
                    },
                    tracing::debug_span!("paybind.provider.resolve", provider = %F::KIND),
                );
            }
        }
    }

    fn on_primary(self: &Arc<Self>, handle: AsyncHandle<Option<SdkHandle>>) {
        if !self.live.is_alive() {
            return;
        }
        match handle {
            AsyncHandle::Pending => {}
            AsyncHandle::Resolved(None) => {
                tracing::debug!(provider = %F::KIND, "payment SDK handle resolved to nothing");
            }
            AsyncHandle::Resolved(Some(sdk)) => {
                self.register_wrapper(&sdk);
                self.context.send_modify(|value| {
                    value.primary = Some(sdk);
                    value.status = ProviderStatus::AwaitingConfiguration;
                });
                tracing::debug!(provider = %F::KIND, "payment SDK handle accepted");
                self.maybe_initialize();
            }
            AsyncHandle::Rejected(error) => {
                tracing::warn!(provider = %F::KIND, %error, "payment SDK handle could not be resolved");
                self.set_status(ProviderStatus::Failed(InitializationFailure::Primary {
                    provider: F::KIND,
                    error,
                }));
            }
        }
    }

    fn register_wrapper(&self, sdk: &SdkHandle) {
        if !self.config.binding.register_wrapper {
            return;
        }
        match sdk.register_wrapper(&self.config.binding.app_info) {
            Ok(()) => tracing::trace!(provider = %F::KIND, "wrapper registered"),
            Err(error) if error.kind == SdkErrorKind::Unsupported => {}
            Err(error) => tracing::debug!(provider = %F::KIND, %error, "wrapper registration failed"),
        }
    }

    fn maybe_initialize(self: &Arc<Self>) {
        let Some(sdk) = self.context.borrow().primary.clone() else {
            return;
        };
        let options = {
            let mut state = self.lock();
            if !self.flavor.ready_to_initialize(&state.latest) {
                return;
            }
            if self
                .init_issued
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            state.applied = Some(state.latest.clone());
            state.latest.clone()
        };

        self.set_status(ProviderStatus::InitializingSecondary);
        match self.flavor.initialize(&sdk, &options) {
            Initialization::Complete(result) => self.finish(result),
            Initialization::Pending(future) => {
                let weak: Weak<Self> = Arc::downgrade(self);
                spawn_in_span(
                    async move {
                        let result = future.await;
                        match weak.upgrade() {
                            Some(shared) => shared.finish(result),
                            None => {
                                if let Ok(init) = result {
                                    F::teardown(&init.secondary);
                                }
                            }
                        }
                    },
                    tracing::debug_span!("paybind.provider.initialize", provider = %F::KIND),
                );
            }
        }
    }

    fn finish(self: &Arc<Self>, result: InitResult<F::Secondary, F::Derived>) {
        if !self.live.is_alive() {
            tracing::debug!(provider = %F::KIND, "initialization finished after unmount");
            if let Ok(init) = result {
                F::teardown(&init.secondary);
            }
            return;
        }

        match result {
            Ok(Initialized { secondary, derived }) => {
                self.context.send_modify(|value| {
                    value.secondary = Some(secondary.clone());
                    value.derived = derived;
                    value.status = ProviderStatus::Ready;
                });
                tracing::debug!(provider = %F::KIND, "provider ready");

                let publisher = DerivedPublisher {
                    context: Arc::clone(&self.context),
                    live: self.live.clone(),
                };
                let subscription = self.flavor.subscribe(&secondary, publisher);
                let stale = {
                    let mut state = self.lock();
                    state.subscription = subscription;
                    if self.live.is_alive() {
                        None
                    } else {
                        state.subscription.take()
                    }
                };
                drop(stale);
                self.reconcile_options();
            }
            Err(failure) => {
                tracing::warn!(provider = %F::KIND, %failure, "initialization failed");
                self.set_status(ProviderStatus::Failed(failure));
            }
        }
    }

    fn reconcile_options(&self) {
        let Some(secondary) = self.context.borrow().secondary.clone() else {
            return;
        };
        let (next, previous) = {
            let mut state = self.lock();
            let Some(applied) = state.applied.take() else {
                return;
            };
            state.applied = Some(state.latest.clone());
            (state.latest.clone(), applied)
        };
        if next == previous {
            return;
        }
        self.flavor
            .apply_updates(&secondary, &next, &previous, self.config.diagnostics.as_ref());
    }

    fn shutdown(&self) {
        if !self.live.revoke() {
            return;
        }
        self.resolver.close();
        let subscription = self.lock().subscription.take();
        drop(subscription);
        let secondary = self.context.borrow().secondary.clone();
        if let Some(secondary) = secondary {
            F::teardown(&secondary);
        }
        tracing::debug!(provider = %F::KIND, "provider unmounted");
    }
}

/// Spawns `task` on the current runtime, inside `span` when telemetry is on.
pub(crate) fn spawn_in_span<T>(task: T, span: tracing::Span)
where
    T: Future<Output = ()> + Send + 'static,
{
    #[cfg(feature = "telemetry")]
    let task = tracing::Instrument::instrument(task, span);
    #[cfg(not(feature = "telemetry"))]
    drop(span);
    tokio::spawn(task);
}
