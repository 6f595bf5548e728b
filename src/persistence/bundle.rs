use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Typed key/value bundle backed by a JSON object.
///
/// Keys are kept sorted, so two bundles with the same content serialize to
/// the same bytes and share a [`fingerprint`](Bundle::fingerprint).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle {
    values: Map<String, Value>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Read a typed value. A missing key is `Ok(None)`, not an error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub fn put_bundle(&mut self, key: impl Into<String>, bundle: Bundle) {
        self.values.insert(key.into(), Value::Object(bundle.values));
    }

    pub fn get_bundle(&self, key: &str) -> Option<Bundle> {
        match self.values.get(key) {
            Some(Value::Object(values)) => Some(Bundle {
                values: values.clone(),
            }),
            _ => None,
        }
    }

    pub fn put_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn fingerprint(&self) -> blake3::Hash {
        let bytes = serde_json::to_vec(&self.values).unwrap_or_default();
        blake3::hash(&bytes)
    }
}
