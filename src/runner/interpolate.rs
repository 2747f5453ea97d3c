//! Expression substitution for strings
//!
//! Only three expression forms are recognized:
//! - `${{ inputs.NAME }}`
//! - `${{ steps.ID.outputs.NAME }}`
//! - `${{ github.action_path }}`
//!
//! Anything else inside `${{ }}` is left untouched. Substitution is a single
//! pass; substituted values are never scanned again.

use crate::config::{scalar_to_string, InputSpec};
use crate::runner::{output_key, ScopedEnv, StepOutputs};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

static EXPRESSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\{\{\s*(?:inputs\.([A-Za-z0-9_-]+)|steps\.([A-Za-z0-9_-]+)\.outputs\.([A-Za-z0-9_-]+)|(github\.action_path))\s*\}\}",
    )
    .unwrap()
});

/// Everything an expression can resolve against
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionContext<'a> {
    /// Current scoped environment
    pub env: &'a ScopedEnv,

    /// Outputs captured so far in the current composite
    pub outputs: &'a StepOutputs,

    /// Input declarations of the executing action (for defaults)
    pub inputs: &'a BTreeMap<String, InputSpec>,

    /// Directory of the executing action
    pub action_path: &'a Path,
}

impl<'a> SubstitutionContext<'a> {
    /// Resolve an input: environment, then declared default, then empty
    pub fn input(&self, name: &str) -> String {
        if let Some(value) = self.env.get_input(name) {
            return value;
        }

        self.inputs
            .get(name)
            .and_then(|spec| spec.default.as_ref())
            .and_then(scalar_to_string)
            .unwrap_or_default()
    }

    /// Resolve a step output, empty if never produced
    pub fn step_output(&self, step_id: &str, name: &str) -> String {
        self.outputs
            .get_key(&output_key(step_id, name))
            .unwrap_or_default()
            .to_string()
    }
}

/// Substitute the supported expressions in a string
pub fn substitute(s: &str, ctx: &SubstitutionContext<'_>) -> String {
    if !s.contains("${{") {
        return s.to_string();
    }

    EXPRESSION_REGEX
        .replace_all(s, |caps: &Captures| {
            if let Some(name) = caps.get(1) {
                ctx.input(name.as_str())
            } else if let (Some(id), Some(name)) = (caps.get(2), caps.get(3)) {
                ctx.step_output(id.as_str(), name.as_str())
            } else {
                ctx.action_path.display().to_string()
            }
        })
        .into_owned()
}

/// Substitute all values in a map
pub fn substitute_map<'m, I>(map: I, ctx: &SubstitutionContext<'_>) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'m String, &'m String)>,
{
    map.into_iter()
        .map(|(key, value)| (key.clone(), substitute(value, ctx)))
        .collect()
}

/// Substitute a list of strings
pub fn substitute_list(list: &[String], ctx: &SubstitutionContext<'_>) -> Vec<String> {
    list.iter().map(|s| substitute(s, ctx)).collect()
}
