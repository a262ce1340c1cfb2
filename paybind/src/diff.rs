//! Options diffing.
//!
//! [`OptionsDiff`] compares the options of the current render against the last
//! applied snapshot and keeps only what is safe to push to the SDK. Immutable
//! keys never make it into an update; changing one produces exactly one
//! [`UnsupportedMutation`] per key per call.
//!
//! Keys present in the previous snapshot but missing from the next one are not
//! reported: the SDK has no way to "unset" an option, so a removal is a no-op.

use crate::diagnostics::{DiagnosticSink, UnsupportedMutation};
use crate::options::{Options, deep_equal};

/// An option key that may only be set at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmutableKey {
    /// The option key.
    pub key: &'static str,
    /// Guidance appended to the warning.
    pub hint: Option<&'static str>,
}

/// Computes minimal safe option updates for one owner.
#[derive(Debug, Clone)]
pub struct OptionsDiff {
    owner: &'static str,
    immutable: Vec<ImmutableKey>,
}

impl OptionsDiff {
    /// Creates a diff engine whose warnings name `owner`.
    #[must_use]
    pub const fn new(owner: &'static str) -> Self {
        Self {
            owner,
            immutable: Vec::new(),
        }
    }

    /// Marks `key` as immutable.
    #[must_use]
    pub fn immutable(self, key: &'static str) -> Self {
        self.immutable_with_hint(key, None)
    }

    /// Marks `key` as immutable, with a custom hint in the warning.
    #[must_use]
    pub fn immutable_with_hint(mut self, key: &'static str, hint: Option<&'static str>) -> Self {
        self.immutable.push(ImmutableKey { key, hint });
        self
    }

    /// Returns the immutable keys.
    #[must_use]
    pub fn immutable_keys(&self) -> &[ImmutableKey] {
        &self.immutable
    }

    /// Diffs `next` against `prev`.
    ///
    /// Returns `None` when nothing mutable changed, so callers can skip the
    /// SDK update call entirely. A missing `prev` treats every key as changed.
    #[must_use]
    pub fn diff(
        &self,
        next: &Options,
        prev: Option<&Options>,
        sink: &dyn DiagnosticSink,
    ) -> Option<Options> {
        let mut updates = Options::new();

        for (key, value) in next {
            let changed = prev
                .and_then(|p| p.get(key))
                .is_none_or(|previous| !deep_equal(value, previous));

            if let Some(immutable) = self.immutable.iter().find(|i| i.key == key.as_str()) {
                if changed {
                    sink.unsupported_mutation(
                        &UnsupportedMutation::option(self.owner, key.clone())
                            .with_hint(immutable.hint),
                    );
                }
                continue;
            }

            if changed {
                updates.insert(key.clone(), value.clone());
            }
        }

        if updates.is_empty() {
            None
        } else {
            tracing::trace!(owner = self.owner, keys = ?updates.keys().collect::<Vec<_>>(), "options changed");
            Some(updates)
        }
    }
}
