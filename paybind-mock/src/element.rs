//! Elements group and widget doubles.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use paybind::error::{SdkError, SdkErrorKind};
use paybind::sdk::{DomNode, Element, ElementsGroup, EventListener, ListenerId};
use paybind::{ElementEvent, ElementKind, Options};
use serde_json::Value;

use crate::{Calls, lock};

/// A recorded SDK widget.
pub struct MockElement {
    label: String,
    options: Options,
    next_listener: AtomicU64,
    listeners: Mutex<Vec<(ElementEvent, ListenerId, EventListener)>>,
    mounts: Calls<DomNode>,
    updates: Calls<Options>,
    destroys: AtomicUsize,
    fail_mount: AtomicBool,
    fail_destroy: AtomicBool,
}

impl fmt::Debug for MockElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockElement")
            .field("label", &self.label)
            .field("listeners", &lock(&self.listeners).len())
            .field("destroys", &self.destroy_count())
            .finish_non_exhaustive()
    }
}

impl MockElement {
    /// Creates a widget labelled with the SDK type or factory that made it.
    #[must_use]
    pub fn new(label: impl Into<String>, options: Options) -> Self {
        Self {
            label: label.into(),
            options,
            next_listener: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            mounts: Calls::default(),
            updates: Calls::default(),
            destroys: AtomicUsize::new(0),
            fail_mount: AtomicBool::new(false),
            fail_destroy: AtomicBool::new(false),
        }
    }

    /// SDK type or factory name.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Options the widget was created with.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Delivers `payload` to every listener of `event`.
    pub fn emit(&self, event: ElementEvent, payload: &Value) {
        let listeners: Vec<EventListener> = lock(&self.listeners)
            .iter()
            .filter(|(e, ..)| *e == event)
            .map(|(.., listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(payload);
        }
    }

    /// Listeners currently registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: ElementEvent) -> usize {
        lock(&self.listeners)
            .iter()
            .filter(|(e, ..)| *e == event)
            .count()
    }

    /// Listeners currently registered for any event.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Nodes the widget was mounted into.
    #[must_use]
    pub fn mounts(&self) -> Vec<DomNode> {
        self.mounts.all()
    }

    /// Update payloads received.
    #[must_use]
    pub fn updates(&self) -> Vec<Options> {
        self.updates.all()
    }

    /// Number of `destroy` calls.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    /// Makes `mount` fail.
    pub fn fail_mount(&self) {
        self.fail_mount.store(true, Ordering::SeqCst);
    }

    /// Makes `destroy` fail, as if a parent had already torn the widget down.
    pub fn fail_destroy(&self) {
        self.fail_destroy.store(true, Ordering::SeqCst);
    }
}

impl Element for MockElement {
    fn mount(&self, node: &DomNode) -> Result<(), SdkError> {
        self.mounts.push(node.clone());
        if self.fail_mount.load(Ordering::SeqCst) {
            return Err(SdkError::new(format!("cannot mount into #{}", node.id())));
        }
        Ok(())
    }

    fn on(&self, event: ElementEvent, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        lock(&self.listeners).push((event, id, listener));
        id
    }

    fn off(&self, _event: ElementEvent, listener: ListenerId) {
        lock(&self.listeners).retain(|(_, id, _)| *id != listener);
    }

    fn update(&self, options: &Options) {
        self.updates.push(options.clone());
    }

    fn destroy(&self) -> Result<(), SdkError> {
        let previous = self.destroys.fetch_add(1, Ordering::SeqCst);
        if previous > 0 || self.fail_destroy.load(Ordering::SeqCst) {
            return Err(SdkError::new("widget already destroyed").with_kind(SdkErrorKind::Destroyed));
        }
        lock(&self.listeners).clear();
        Ok(())
    }
}

/// A recorded elements group.
#[derive(Debug)]
pub struct MockElements {
    options: Options,
    created: Calls<(ElementKind, Arc<MockElement>)>,
    updates: Calls<Options>,
    fail_create: AtomicBool,
}

impl MockElements {
    /// Creates a group as `elements(options)` would.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            created: Calls::default(),
            updates: Calls::default(),
            fail_create: AtomicBool::new(false),
        }
    }

    /// Options the group was created with.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Every widget created, oldest first.
    #[must_use]
    pub fn created(&self) -> Vec<Arc<MockElement>> {
        self.created.all().into_iter().map(|(_, e)| e).collect()
    }

    /// The most recent widget of `kind`.
    #[must_use]
    pub fn element(&self, kind: ElementKind) -> Option<Arc<MockElement>> {
        self.created
            .all()
            .into_iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, e)| e)
    }

    /// Update payloads received.
    #[must_use]
    pub fn updates(&self) -> Vec<Options> {
        self.updates.all()
    }

    /// Makes `create` fail.
    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }
}

impl ElementsGroup for MockElements {
    fn create(&self, kind: ElementKind, options: &Options) -> Result<Arc<dyn Element>, SdkError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SdkError::new(format!("cannot create {}", kind.sdk_type())));
        }
        let element = Arc::new(MockElement::new(kind.sdk_type(), options.clone()));
        self.created.push((kind, Arc::clone(&element)));
        Ok(element)
    }

    fn update(&self, options: &Options) {
        self.updates.push(options.clone());
    }

    fn get_element(&self, kind: ElementKind) -> Option<Arc<dyn Element>> {
        self.element(kind).map(|e| e as Arc<dyn Element>)
    }
}
