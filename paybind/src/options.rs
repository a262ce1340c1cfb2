//! Dynamic option bags handed to the payment SDK.
//!
//! SDK options are loosely typed nested maps. Most values are plain data that
//! converts to and from JSON, but some are references the bindings cannot look
//! inside: callbacks, or SDK objects such as a payment request. Those are held
//! as [`Opaque`] values and compare by identity.
//!
//! [`deep_equal`] is the single structural equality used for change detection
//! everywhere in the crate.

use std::any::Any;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::sync::Arc;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map, Number, Value};

/// A shared reference that only compares equal to clones of itself.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    /// Wraps `value` in a fresh reference.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wraps an existing shared value without reallocating it.
    #[must_use]
    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(value)
    }

    /// Attempts to view the referenced value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Returns `true` when both point at the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// One value in an [`Options`] bag.
#[derive(Debug, Clone)]
pub enum OptionValue {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(Number),
    /// A string.
    String(String),
    /// A sequence, compared element by element.
    Array(Vec<OptionValue>),
    /// A nested map, compared key by key.
    Object(Options),
    /// Anything else, compared by identity.
    Opaque(Opaque),
}

impl OptionValue {
    /// Returns the nested map, if this is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Options> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the opaque reference, if this is one.
    #[must_use]
    pub const fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Self::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Returns `true` for [`OptionValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts to JSON. Opaque references become `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null | Self::Opaque(_) => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(o) => Value::Object(o.to_json()),
        }
    }
}

impl PartialEq for OptionValue {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(Options::from(map)),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<Options> for OptionValue {
    fn from(value: Options) -> Self {
        Self::Object(value)
    }
}

impl From<Opaque> for OptionValue {
    fn from(value: Opaque) -> Self {
        Self::Opaque(value)
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null | Self::Opaque(_) => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(o) => o.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// A string-keyed bag of [`OptionValue`]s.
#[derive(Debug, Clone, Default)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(json_kind(&other)),
                &"a JSON object",
            )),
        }
    }

    /// Adds or replaces `key` and returns self for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces `key`, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.0.remove(key)
    }

    /// Returns a copy without `key`.
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        let mut copy = self.clone();
        copy.remove(key);
        copy
    }

    /// Looks up `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Looks up `key` and returns it as a nested map.
    #[must_use]
    pub fn get_object(&self, key: &str) -> Option<&Self> {
        self.get(key).and_then(OptionValue::as_object)
    }

    /// Returns `true` when `key` is present with a non-null value.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    /// Returns `true` when `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, OptionValue> {
        self.0.iter()
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts to a JSON object. Opaque references become `null`.
    #[must_use]
    pub fn to_json(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl PartialEq for Options {
    fn eq(&self, other: &Self) -> bool {
        objects_equal(self, other)
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| (k, OptionValue::from(v)))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Options {
    type Item = (&'a String, &'a OptionValue);
    type IntoIter = btree_map::Iter<'a, String, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Options {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_json(Value::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Structural equality over option values.
///
/// Maps and sequences are compared recursively, numbers by value (`1` equals
/// `1.0`), and opaque references by identity only.
#[must_use]
pub fn deep_equal(a: &OptionValue, b: &OptionValue) -> bool {
    match (a, b) {
        (OptionValue::Null, OptionValue::Null) => true,
        (OptionValue::Bool(x), OptionValue::Bool(y)) => x == y,
        (OptionValue::Number(x), OptionValue::Number(y)) => numbers_equal(x, y),
        (OptionValue::String(x), OptionValue::String(y)) => x == y,
        (OptionValue::Array(x), OptionValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| deep_equal(a, b))
        }
        (OptionValue::Object(x), OptionValue::Object(y)) => objects_equal(x, y),
        (OptionValue::Opaque(x), OptionValue::Opaque(y)) => x.ptr_eq(y),
        _ => false,
    }
}

fn objects_equal(a: &Options, b: &Options) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| deep_equal(v, other)))
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        a.as_f64() == b.as_f64()
    } else {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: Value) -> OptionValue {
        OptionValue::from(v)
    }

    #[test]
    fn test_nested_objects_compare_structurally() {
        let a = value(json!({"appearance": {"theme": "stripe", "variables": {"colorText": "#000"}}}));
        let b = value(json!({"appearance": {"theme": "stripe", "variables": {"colorText": "#000"}}}));
        assert_eq!(a, b);

        let c = value(json!({"appearance": {"theme": "night"}}));
        assert_ne!(a, c);
    }

    #[test]
    fn test_arrays_compare_by_position() {
        assert_eq!(value(json!([1, "a", null])), value(json!([1, "a", null])));
        assert_ne!(value(json!([1, 2])), value(json!([2, 1])));
        assert_ne!(value(json!([1])), value(json!([1, 1])));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(value(json!(1)), value(json!(1.0)));
        assert_ne!(value(json!(1)), value(json!(2)));
    }

    #[test]
    fn test_missing_key_is_not_null() {
        let a = value(json!({"a": null}));
        let b = value(json!({}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_opaque_compares_by_identity() {
        let handle = Opaque::new(String::from("payment-request"));
        let same = OptionValue::Opaque(handle.clone());
        let other = OptionValue::Opaque(Opaque::new(String::from("payment-request")));

        assert_eq!(OptionValue::Opaque(handle), same);
        assert_ne!(same, other);
    }

    #[test]
    fn test_opaque_differs_from_plain_data() {
        let opaque = OptionValue::Opaque(Opaque::new(1_u8));
        assert_ne!(opaque, OptionValue::Null);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Options::from_json(json!(["clientSecret"])).is_err());
        assert!(Options::from_json(json!({"clientSecret": "pi_123"})).is_ok());
    }

    #[test]
    fn test_serialize_drops_opaque_payload() {
        let options = Options::new()
            .with("mode", "payment")
            .with("paymentRequest", Opaque::new(()));
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json, json!({"mode": "payment", "paymentRequest": null}));
    }

    #[test]
    fn test_deserialize_from_json_object() {
        let options: Options =
            serde_json::from_value(json!({"locale": "fr", "fonts": [{"family": "Inter"}]})).unwrap();
        assert_eq!(options.get("locale").and_then(OptionValue::as_str), Some("fr"));
        assert!(matches!(options.get("fonts"), Some(OptionValue::Array(f)) if f.len() == 1));
    }
}
