//! Core configuration types
//!
//! This module defines the data structures that represent an action.yml metadata file.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Top-level action metadata
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionDescriptor {
    /// Action name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Action description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Author (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Declared inputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputSpec>,

    /// Declared outputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputSpec>,

    /// Kind-determining section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<Runs>,
}

impl ActionDescriptor {
    /// Display name used in logs
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed action>")
    }

    /// Composite steps, empty for any other kind
    pub fn steps(&self) -> &[Step] {
        self.runs.as_ref().map(|r| r.steps.as_slice()).unwrap_or(&[])
    }
}

/// An input declaration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputSpec {
    /// Usage description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value (any YAML scalar)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Whether the caller is expected to provide the input
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub required: bool,

    /// Shown when the input is used
    #[serde(
        rename = "deprecationMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecation_message: Option<String>,
}

/// An output declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OutputSpec {
    /// Bare value expression
    Expression(String),

    /// Mapping with a value expression and description
    Detailed(OutputDetail),
}

/// Detailed output declaration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value expression (composite actions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl OutputSpec {
    /// The value expression, if one is declared
    pub fn value(&self) -> Option<&str> {
        match self {
            OutputSpec::Expression(expr) => Some(expr),
            OutputSpec::Detailed(detail) => detail.value.as_deref(),
        }
    }
}

/// The `runs` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Runs {
    /// Runtime tag (node20, docker, composite, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,

    /// Entry file for scripted actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Script run before main
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<String>,

    /// Script run after main
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,

    /// Container image or Dockerfile path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Container entrypoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    /// Container arguments
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_scalar_list"
    )]
    pub args: Vec<String>,

    /// Container environment
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "deserialize_scalar_map"
    )]
    pub env: BTreeMap<String, String>,

    /// Composite steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

/// A composite step
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Step {
    /// Output-scoping key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Diagnostic name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Script text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Delegated action reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Inputs for the delegated action
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "deserialize_scalar_map"
    )]
    pub with: BTreeMap<String, String>,

    /// Shell for script steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Step-only environment
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "deserialize_scalar_map"
    )]
    pub env: BTreeMap<String, String>,

    /// Working directory, relative to the workspace
    #[serde(
        rename = "working-directory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub working_directory: Option<String>,
}

impl Step {
    /// Label used in logs: name, then id, then the run/uses text
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.id.clone())
            .or_else(|| self.uses.clone())
            .or_else(|| self.run.as_ref().and_then(|r| r.lines().next()).map(str::to_string))
            .unwrap_or_else(|| "<empty step>".to_string())
    }
}

/// Render a YAML scalar the way it is passed through the environment
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}

/// Custom deserializer for maps whose values may be any YAML scalar
fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Mapping(map) => {
            let mut result = BTreeMap::new();
            for (key, val) in map {
                let key = scalar_to_string(&key)
                    .ok_or_else(|| D::Error::custom("map keys must be scalars"))?;
                // Null values become empty strings
                result.insert(key, scalar_to_string(&val).unwrap_or_default());
            }
            Ok(result)
        }
        Value::Null => Ok(BTreeMap::new()),
        _ => Err(D::Error::custom("expected a mapping")),
    }
}

/// Custom deserializer for lists whose items may be any YAML scalar
fn deserialize_scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Sequence(seq) => Ok(seq
            .iter()
            .map(|item| scalar_to_string(item).unwrap_or_default())
            .collect()),
        // Single scalar argument
        Value::String(s) => Ok(vec![s]),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("args must be a string or array")),
    }
}

/// Custom deserializer for flags written as booleans or "true"/"false" strings
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid boolean '{}'", other))),
        },
        Value::Null => Ok(false),
        _ => Err(D::Error::custom("expected a boolean")),
    }
}
