//! Case-insensitive variable store threaded through one evaluation

use crate::workflow::types::WorkflowVariable;
use std::collections::{BTreeMap, HashMap};

/// Mutable name -> value map for a single run
///
/// Lookups ignore case. The first spelling a name was inserted with is kept
/// as its display name, later writes only replace the value.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    /// Key: lowercased name, Value: (display name, value)
    entries: HashMap<String, (String, String)>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial store: workflow defaults first (a later duplicate
    /// name overwrites an earlier one), then caller inputs on top
    pub fn initialize<'a, I>(variables: &[WorkflowVariable], inputs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut store = Self::new();
        for variable in variables {
            store.set(&variable.name, variable.default_value.clone().unwrap_or_default());
        }
        for (name, value) in inputs {
            store.set(name, value.clone());
        }
        store
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Value of `name`, or the empty string when it is not defined
    pub fn get_or_empty(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.entries
            .entry(name.to_lowercase())
            .and_modify(|entry| entry.1 = value.clone())
            .or_insert_with(|| (name.to_string(), value));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an operand: `$name` reads a variable (empty if undefined),
    /// anything else is returned as a literal
    pub fn resolve(&self, operand: &str) -> String {
        match operand.strip_prefix('$') {
            Some(name) => self.get_or_empty(name.trim()),
            None => operand.to_string(),
        }
    }

    /// Snapshot keyed by display name, sorted
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.values().cloned().collect()
    }
}
