//! Scoped environment and input key mapping
//!
//! Inputs reach an action as `INPUT_<NAME>` variables. The name is uppercased
//! and spaces become underscores; hyphens are kept as they are.

use std::collections::HashMap;
use std::env;

/// Prefix of input variables
pub const INPUT_PREFIX: &str = "INPUT_";

/// Map an input name to the variable that backs it
pub fn input_key(name: &str) -> String {
    format!("{}{}", INPUT_PREFIX, name.replace(' ', "_").to_uppercase())
}

/// The variable map visible at one execution level
///
/// Delegations receive a clone; nothing a nested action sets flows back
/// except through its declared outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopedEnv {
    vars: HashMap<String, String>,
}

impl ScopedEnv {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Get a variable by its literal key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set a variable by its literal key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Remove a variable, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Whether a literal key is present
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Get an input value, trimmed
    pub fn get_input(&self, name: &str) -> Option<String> {
        self.get_input_raw(name).map(|v| v.trim().to_string())
    }

    /// Get an input value without trimming
    pub fn get_input_raw(&self, name: &str) -> Option<&str> {
        self.get(&input_key(name))
    }

    /// Set an input value, trimmed
    pub fn set_input(&mut self, name: &str, value: &str) {
        self.set(input_key(name), value.trim());
    }

    /// Set an input value without trimming
    pub fn set_input_raw(&mut self, name: &str, value: impl Into<String>) {
        self.set(input_key(name), value);
    }

    /// Whether an input is present, whatever its value
    pub fn has_input(&self, name: &str) -> bool {
        self.contains(&input_key(name))
    }

    /// Iterate over all variables
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the environment is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy without any input variables
    ///
    /// A delegated action starts from this and sees only the inputs its
    /// caller passes with `with:`.
    pub fn without_inputs(&self) -> Self {
        self.vars
            .iter()
            .filter(|(key, _)| !key.starts_with(INPUT_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl From<HashMap<String, String>> for ScopedEnv {
    fn from(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScopedEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ScopedEnv {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.vars
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}
