// params.rs - Caller parameter bindings and validated bindings

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::error::{Result, TaskError};
use super::value::Value;

/// Mapping from field name to value, as supplied by the caller.
///
/// Unset fields are simply absent; a JSON `null` deserialises to "unset".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of this set; values in `other` win
    pub fn merge(mut self, other: ParameterSet) -> Self {
        self.values.extend(other.values);
        self
    }
}

impl<'de> Deserialize<'de> for ParameterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<Value>>::deserialize(deserializer)?;
        let values = raw
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        Ok(Self { values })
    }
}

impl FromIterator<(String, Value)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A parameter set that passed schema validation, with defaults filled in.
///
/// Immutable; formatters and output derivers only read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bindings {
    task: String,
    values: BTreeMap<String, Value>,
    explicit: BTreeSet<String>,
    files: BTreeSet<String>,
}

impl Bindings {
    pub(crate) fn new(
        task: &str,
        values: BTreeMap<String, Value>,
        explicit: BTreeSet<String>,
        files: BTreeSet<String>,
    ) -> Self {
        Self {
            task: task.to_string(),
            values,
            explicit,
            files,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Bound either explicitly or through a default
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bound by the caller rather than through a default
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    /// Declared with a file kind in the schema
    pub fn is_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Unset booleans read as `false`
    pub fn flag(&self, name: &str) -> bool {
        self.get_bool(name).unwrap_or(false)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Any scalar rendered as a token (`0.25`, `moving.nii`, `1`)
    pub fn render(&self, name: &str) -> Option<String> {
        self.get(name).map(Value::render)
    }

    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.get_str(name).ok_or_else(|| TaskError::missing(name))
    }

    pub fn require_int(&self, name: &str) -> Result<i64> {
        self.get_int(name).ok_or_else(|| TaskError::missing(name))
    }

    pub fn require_float(&self, name: &str) -> Result<f64> {
        self.get_float(name).ok_or_else(|| TaskError::missing(name))
    }

    pub fn require_render(&self, name: &str) -> Result<String> {
        self.render(name).ok_or_else(|| TaskError::missing(name))
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn get_int_list(&self, name: &str) -> Option<Vec<i64>> {
        self.get_list(name)
            .map(|items| items.iter().filter_map(Value::as_int).collect())
    }

    pub fn get_float_list(&self, name: &str) -> Option<Vec<f64>> {
        self.get_list(name)
            .map(|items| items.iter().filter_map(Value::as_float).collect())
    }

    pub fn get_str_list(&self, name: &str) -> Option<Vec<String>> {
        self.get_list(name).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    pub fn get_bool_list(&self, name: &str) -> Option<Vec<bool>> {
        self.get_list(name)
            .map(|items| items.iter().filter_map(Value::as_bool).collect())
    }

    pub fn get_nested_int_list(&self, name: &str) -> Option<Vec<Vec<i64>>> {
        self.get_list(name).map(|items| {
            items
                .iter()
                .map(|inner| {
                    inner
                        .as_list()
                        .map(|vals| vals.iter().filter_map(Value::as_int).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
    }

    pub fn get_nested_float_list(&self, name: &str) -> Option<Vec<Vec<f64>>> {
        self.get_list(name).map(|items| {
            items
                .iter()
                .map(|inner| {
                    inner
                        .as_list()
                        .map(|vals| vals.iter().filter_map(Value::as_float).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
