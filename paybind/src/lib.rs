#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Lifecycle bindings between a declarative component tree and a payment SDK.
//!
//! The payment SDK hands out imperative objects: a primary handle, a secondary
//! object created once from it (an elements group, a checkout session, an
//! embedded checkout), and individual widgets mounted into DOM nodes. This crate
//! owns the orchestration around those objects so that host code can stay
//! declarative: pass a handle (or a future of one) and options on every render,
//! and the bindings make sure every SDK object is created exactly once, kept in
//! sync with changing options, and torn down deterministically.
//!
//! # Overview
//!
//! - [`provider::Provider`] is the per-provider state machine. It resolves the
//!   primary handle, issues the one-shot initialization call, and publishes a
//!   [`provider::ProviderContextValue`] for descendants.
//! - [`context::Scope`] threads provider contexts down the tree and implements
//!   the "nearest provider" lookups, including the conflict rule between the
//!   Elements and Checkout provider families.
//! - [`widget::WidgetController`] binds one SDK widget to one DOM node for the
//!   lifetime of one component.
//! - [`diff::OptionsDiff`] decides which option changes may be applied live.
//!
//! # Modules
//!
//! - [`config`] - Serde-backed configuration and per-provider runtime settings
//! - [`context`] - Provider scopes and context accessors
//! - [`diagnostics`] - Unsupported-mutation warnings and their sinks
//! - [`diff`] - Options diffing with immutable keys
//! - [`error`] - Error taxonomy
//! - [`options`] - Dynamic option bags and structural equality
//! - [`provider`] - Provider state machine and its Elements, Checkout and
//!   embedded checkout flavors
//! - [`resolver`] - Value-or-future normalization and liveness flags
//! - [`sdk`] - The contract the external payment SDK must implement
//! - [`widget`] - Widget lifecycle, variant table and event bindings
//!
//! # Feature Flags
//!
//! - `telemetry` - Wraps asynchronous provider continuations in tracing spans

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod options;
pub mod provider;
pub mod resolver;
pub mod sdk;
pub mod widget;

pub use config::{AppInfo, BindingConfig, ProviderConfig, SessionShape};
pub use context::{Scope, WidgetHost};
pub use error::{BindingError, InitializationFailure, SdkError};
pub use options::{OptionValue, Options};
pub use provider::{
    CheckoutProvider, ElementsProvider, EmbeddedCheckoutProvider, ProviderKind, ProviderStatus,
};
pub use sdk::{DomNode, HandleSource, PaymentSdk, SdkHandle};
pub use widget::{
    ElementEvent, ElementKind, EmbeddedCheckoutMount, WidgetController, WidgetProps, WidgetStatus,
};
