use std::collections::BTreeMap;

use serde_json::Value;

/// Provider-specific fields we do not model explicitly.
///
/// Every wire struct carries one of these behind `#[serde(flatten)]` so
/// envelope extras such as `system_fingerprint`, `logprobs` or `reasoning`
/// survive a round-trip through the shim unchanged, at the nesting level
/// they were observed. A `BTreeMap` keeps re-serialization deterministic.
#[derive(Default, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnknownFields(BTreeMap<String, Value>);

impl UnknownFields {
    /// True when no extra fields were observed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of preserved fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Look up a preserved field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Record a field for re-emission.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl FromIterator<(String, Value)> for UnknownFields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
