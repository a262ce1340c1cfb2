//! Binding configuration.
//!
//! [`BindingConfig`] is plain data and can be loaded from JSON; every field has
//! a default, so an empty object is a valid configuration.
//!
//! # Example
//!
//! ```json
//! {
//!   "appInfo": { "name": "shop-frontend", "version": "2.1.0" },
//!   "sessionShape": "nested"
//! }
//! ```
//!
//! [`ProviderConfig`] adds the runtime pieces a provider needs on top of that,
//! currently the [`DiagnosticSink`] that receives unsupported-mutation warnings.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticSink, TracingSink};

/// Metadata registered with the SDK when a primary handle is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    /// Library or application name.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Library or application version.
    #[serde(default = "default_app_version")]
    pub version: String,

    /// Optional homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_owned()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

const fn default_true() -> bool {
    true
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
            url: None,
        }
    }
}

/// How checkout session fields are exposed next to the loaded actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionShape {
    /// Session fields are merged into the top level of the checkout value.
    #[default]
    Flattened,
    /// Session fields live under a `session` key.
    Nested,
}

/// Serializable configuration shared by all providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingConfig {
    /// Metadata passed to `register_wrapper`.
    #[serde(default)]
    pub app_info: AppInfo,

    /// Whether to call `register_wrapper` at all (default: `true`).
    #[serde(default = "default_true")]
    pub register_wrapper: bool,

    /// Shape of the checkout provider's derived value.
    #[serde(default)]
    pub session_shape: SessionShape,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            app_info: AppInfo::default(),
            register_wrapper: true,
            session_shape: SessionShape::default(),
        }
    }
}

/// Failed to parse a [`BindingConfig`].
#[derive(Debug, thiserror::Error)]
#[error("invalid binding configuration: {0}")]
pub struct ConfigError(#[from] serde_json::Error);

impl BindingConfig {
    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not a valid configuration object.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the app info.
    #[must_use]
    pub fn with_app_info(mut self, app_info: AppInfo) -> Self {
        self.app_info = app_info;
        self
    }

    /// Sets the session shape.
    #[must_use]
    pub const fn with_session_shape(mut self, shape: SessionShape) -> Self {
        self.session_shape = shape;
        self
    }
}

/// Everything a provider is configured with.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Serializable settings.
    pub binding: BindingConfig,
    /// Receiver of unsupported-mutation warnings.
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(BindingConfig::default())
    }
}

impl ProviderConfig {
    /// Creates a provider configuration that logs warnings through `tracing`.
    #[must_use]
    pub fn new(binding: BindingConfig) -> Self {
        Self {
            binding,
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// Replaces the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("binding", &self.binding)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = BindingConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BindingConfig::default());
        assert!(config.register_wrapper);
        assert_eq!(config.session_shape, SessionShape::Flattened);
        assert_eq!(config.app_info.name, "paybind");
    }

    #[test]
    fn test_camel_case_fields() {
        let config = BindingConfig::from_json_str(
            r#"{"appInfo": {"name": "shop", "url": "https://shop.test"}, "sessionShape": "nested", "registerWrapper": false}"#,
        )
        .unwrap();
        assert_eq!(config.app_info.name, "shop");
        assert_eq!(config.app_info.url.as_deref(), Some("https://shop.test"));
        assert_eq!(config.session_shape, SessionShape::Nested);
        assert!(!config.register_wrapper);
    }

    #[test]
    fn test_invalid_json_is_a_config_error() {
        let err = BindingConfig::from_json_str(r#"{"sessionShape": "sideways"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid binding configuration"));
    }
}
