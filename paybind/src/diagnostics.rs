//! Warnings for prop changes the bindings refuse to apply.
//!
//! Changing an immutable option, or swapping the SDK handle under a provider
//! that already owns one, is a programming error but not a fatal one. The
//! change is dropped and an [`UnsupportedMutation`] is reported to the
//! provider's [`DiagnosticSink`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// What the consumer attempted to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationSubject {
    /// The SDK handle passed to a provider.
    Handle,
    /// A top-level option key.
    Option(String),
}

/// A rejected change to something that may only be set once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMutation {
    /// Component that rejected the change, e.g. `"Elements"` or `"CardElement"`.
    pub owner: &'static str,
    /// The changed prop.
    pub subject: MutationSubject,
    /// Extra guidance appended to the message.
    pub hint: Option<&'static str>,
}

impl UnsupportedMutation {
    /// Warning for a replaced SDK handle.
    #[must_use]
    pub const fn handle(owner: &'static str) -> Self {
        Self {
            owner,
            subject: MutationSubject::Handle,
            hint: None,
        }
    }

    /// Warning for a changed immutable option.
    #[must_use]
    pub fn option(owner: &'static str, key: impl Into<String>) -> Self {
        Self {
            owner,
            subject: MutationSubject::Option(key.into()),
            hint: None,
        }
    }

    /// Sets the hint.
    #[must_use]
    pub const fn with_hint(mut self, hint: Option<&'static str>) -> Self {
        self.hint = hint;
        self
    }

    /// Returns the option key, if the subject is an option.
    #[must_use]
    pub fn option_key(&self) -> Option<&str> {
        match &self.subject {
            MutationSubject::Option(key) => Some(key),
            MutationSubject::Handle => None,
        }
    }
}

impl fmt::Display for UnsupportedMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            MutationSubject::Handle => write!(
                f,
                "Unsupported prop change on {}: You cannot change the payment SDK handle after setting it.",
                self.owner
            )?,
            MutationSubject::Option(key) => write!(
                f,
                "Unsupported prop change on {}: options.{key} is not a mutable property.",
                self.owner
            )?,
        }
        if let Some(hint) = self.hint {
            write!(f, " {hint}")?;
        }
        Ok(())
    }
}

/// Receives warnings about rejected changes.
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    /// Reports one rejected change.
    fn unsupported_mutation(&self, warning: &UnsupportedMutation);
}

/// Default sink: logs through `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn unsupported_mutation(&self, warning: &UnsupportedMutation) {
        tracing::warn!(
            owner = warning.owner,
            subject = ?warning.subject,
            "{warning}"
        );
    }
}

/// Sink that keeps every warning in memory, for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    warnings: Mutex<Vec<UnsupportedMutation>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<UnsupportedMutation> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded warnings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of warnings about option `key`.
    #[must_use]
    pub fn count_for_option(&self, key: &str) -> usize {
        self.warnings()
            .iter()
            .filter(|w| w.option_key() == Some(key))
            .count()
    }

    /// Number of warnings about replaced SDK handles.
    #[must_use]
    pub fn handle_changes(&self) -> usize {
        self.warnings()
            .iter()
            .filter(|w| w.subject == MutationSubject::Handle)
            .count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn unsupported_mutation(&self, warning: &UnsupportedMutation) {
        tracing::debug!(owner = warning.owner, "recorded: {warning}");
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_message() {
        let w = UnsupportedMutation::option("Elements", "clientSecret");
        assert_eq!(
            w.to_string(),
            "Unsupported prop change on Elements: options.clientSecret is not a mutable property."
        );
    }

    #[test]
    fn test_hint_is_appended() {
        let w = UnsupportedMutation::option("EmbeddedCheckoutProvider", "onComplete")
            .with_hint(Some("You cannot change the onComplete option after setting it."));
        assert!(w.to_string().ends_with("after setting it."));
    }

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();
        sink.unsupported_mutation(&UnsupportedMutation::option("CardElement", "paymentRequest"));
        sink.unsupported_mutation(&UnsupportedMutation::handle("Elements"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.count_for_option("paymentRequest"), 1);
        assert_eq!(sink.handle_changes(), 1);
    }
}
