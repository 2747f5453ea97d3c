//! Action classification and validation
//!
//! This module decides what kind of action a descriptor describes and checks
//! that its `runs` section is well formed for that kind.

use crate::config::types::{ActionDescriptor, Runs, Step};
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashSet;

/// Runtime tags that select the scripted (JavaScript) runner
pub const SCRIPTED_RUNTIMES: &[&str] = &["node12", "node16", "node20", "node24"];

/// The `using` tag of composite actions
pub const COMPOSITE_TAG: &str = "composite";

/// The `using` tag of container actions
pub const CONTAINER_TAG: &str = "docker";

/// What kind of action a descriptor describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Runs an entry file under a JavaScript runtime
    Scripted,
    /// Runs inside a container image
    Containerized,
    /// Runs a list of steps
    Composite,
    /// A populated `runs` section with an unrecognized runtime
    Unknown(String),
}

/// Shells accepted for composite script steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellKind {
    #[default]
    Bash,
    Sh,
}

impl ShellKind {
    /// Resolve a step's `shell` value; `None` selects bash
    pub fn parse(shell: Option<&str>) -> ConfigResult<Self> {
        let Some(shell) = shell else {
            return Ok(ShellKind::Bash);
        };

        // Accept the "bash -e {0}" template form by looking at the program only
        match shell.split_whitespace().next() {
            Some("bash") => Ok(ShellKind::Bash),
            Some("sh") => Ok(ShellKind::Sh),
            _ => Err(ConfigError::UnsupportedShell(shell.to_string())),
        }
    }

    /// Program and arguments that run a script file
    pub fn command(&self) -> &'static [&'static str] {
        match self {
            ShellKind::Bash => &["bash", "--noprofile", "--norc", "-eo", "pipefail"],
            ShellKind::Sh => &["sh", "-e"],
        }
    }
}

/// Classify a descriptor by its `runs` section
pub fn classify(action: &ActionDescriptor) -> ConfigResult<ActionKind> {
    let runs = action.runs.as_ref().ok_or_else(|| {
        ConfigError::MalformedDescriptor(format!("{} has no 'runs' section", action.display_name()))
    })?;

    classify_runs(runs).ok_or_else(|| {
        ConfigError::MalformedDescriptor(format!(
            "{} has neither 'runs.using' nor 'runs.image'",
            action.display_name()
        ))
    })
}

fn classify_runs(runs: &Runs) -> Option<ActionKind> {
    let using = runs.using.as_deref().map(str::trim);

    if let Some(tag) = using {
        if SCRIPTED_RUNTIMES.contains(&tag) {
            return Some(ActionKind::Scripted);
        }
    }

    if runs.image.is_some() || using == Some(CONTAINER_TAG) {
        return Some(ActionKind::Containerized);
    }

    match using {
        Some(COMPOSITE_TAG) => Some(ActionKind::Composite),
        Some(other) => Some(ActionKind::Unknown(other.to_string())),
        None => None,
    }
}

/// Validate a descriptor for the kind it classifies as
pub fn validate_action(action: &ActionDescriptor) -> ConfigResult<ActionKind> {
    let kind = classify(action)?;
    let Some(runs) = action.runs.as_ref() else {
        return Ok(kind);
    };

    match &kind {
        ActionKind::Composite => validate_steps(action.display_name(), &runs.steps)?,
        ActionKind::Scripted => {
            if runs.main.as_deref().map_or(true, |m| m.trim().is_empty()) {
                return Err(ConfigError::MalformedDescriptor(format!(
                    "{} uses {} but has no 'runs.main'",
                    action.display_name(),
                    runs.using.as_deref().unwrap_or_default()
                )));
            }
        }
        ActionKind::Containerized => {
            if runs.image.as_deref().map_or(true, |i| i.trim().is_empty()) {
                return Err(ConfigError::MalformedDescriptor(format!(
                    "{} uses docker but has no 'runs.image'",
                    action.display_name()
                )));
            }
        }
        ActionKind::Unknown(_) => {}
    }

    Ok(kind)
}

/// Validate a composite step list
pub fn validate_steps(action_name: &str, steps: &[Step]) -> ConfigResult<()> {
    if steps.is_empty() {
        return Err(ConfigError::InvalidCompositeAction(format!(
            "{} has no steps",
            action_name
        )));
    }

    let mut ids = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        if step.run.is_some() && step.uses.is_some() {
            return Err(ConfigError::MalformedDescriptor(format!(
                "step {} of {} declares both 'run' and 'uses'",
                i + 1,
                action_name
            )));
        }

        if step.run.is_some() {
            ShellKind::parse(step.shell.as_deref())?;
        }

        if let Some(id) = &step.id {
            if !ids.insert(id.as_str()) {
                return Err(ConfigError::InvalidCompositeAction(format!(
                    "duplicate step id '{}' in {}",
                    id, action_name
                )));
            }
        }
    }

    Ok(())
}
