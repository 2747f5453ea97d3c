//! Input defaults
//!
//! Declared defaults are injected for inputs the caller did not provide.

use crate::config::{scalar_to_string, InputSpec};
use crate::runner::ScopedEnv;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Inject declared defaults for absent inputs
///
/// Returns the names that received a default, never the values, so callers
/// can log them without exposing secrets.
pub fn apply_defaults(
    env: &mut ScopedEnv,
    inputs: &BTreeMap<String, InputSpec>,
    excluded: &[&str],
) -> Vec<String> {
    let mut applied = Vec::new();

    for (name, spec) in inputs {
        if excluded.contains(&name.as_str()) || env.has_input(name) {
            continue;
        }

        if let Some(value) = spec.default.as_ref().and_then(scalar_to_string) {
            env.set_input_raw(name, value);
            applied.push(name.clone());
        }
    }

    if !applied.is_empty() {
        debug!("Applied input defaults: {}", applied.join(", "));
    }

    applied
}

/// Names of required inputs that are still absent
pub fn missing_required_inputs(env: &ScopedEnv, inputs: &BTreeMap<String, InputSpec>) -> Vec<String> {
    inputs
        .iter()
        .filter(|(name, spec)| spec.required && !env.has_input(name))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Apply defaults, then warn about required inputs that are still missing
pub fn prepare_inputs(
    env: &mut ScopedEnv,
    inputs: &BTreeMap<String, InputSpec>,
    action_name: &str,
) -> Vec<String> {
    let applied = apply_defaults(env, inputs, &[]);

    for name in missing_required_inputs(env, inputs) {
        warn!("Input required and not supplied: {} (action {})", name, action_name);
    }

    for (name, spec) in inputs {
        if let Some(message) = &spec.deprecation_message {
            if env.has_input(name) && !applied.contains(name) {
                warn!("Input '{}' has been deprecated: {}", name, message);
            }
        }
    }

    applied
}
