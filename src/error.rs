//! Error types for actrun

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for actrun operations
pub type Result<T> = std::result::Result<T, ActrunError>;

/// Main error type for actrun
#[derive(Error, Debug)]
pub enum ActrunError {
    /// Action metadata errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Action reference resolution errors
    #[error("Locate error: {0}")]
    Locate(#[from] LocateError),

    /// Step and action execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Action metadata parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed action descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Invalid composite action: {0}")]
    InvalidCompositeAction(String),

    #[error("No action metadata found in {0} (expected action.yml or action.yaml)")]
    MetadataNotFound(PathBuf),

    #[error("Unsupported shell '{0}' (composite steps require bash or sh)")]
    UnsupportedShell(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while resolving an action reference
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Invalid action reference path '{0}'")]
    InvalidReferencePath(String),

    #[error("Action reference '{reference}' resolves to {path}, outside the repository")]
    PathEscapesRepository { reference: String, path: PathBuf },

    #[error("Action '{reference}' not found (tried {caller_path} and {workspace_path})")]
    ActionNotFound {
        reference: String,
        caller_path: PathBuf,
        workspace_path: PathBuf,
    },

    #[error("Invalid action reference '{0}'")]
    InvalidReference(String),

    #[error("Failed to retrieve {owner}/{repo}@{git_ref}: {error}")]
    FetchFailed {
        owner: String,
        repo: String,
        git_ref: String,
        error: String,
    },
}

/// Step and action execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command failed with exit code {code:?}")]
    CommandFailed { code: Option<i32>, output: String },

    #[error("Failed to start '{program}': {error}")]
    Spawn { program: String, error: String },

    #[error("Step {index}{} failed: {source}", .name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
    StepFailed {
        index: usize,
        name: Option<String>,
        #[source]
        source: Box<ActrunError>,
    },

    #[error("Unsupported action kind '{0}'")]
    UnsupportedAction(String),

    #[error("Circular delegation detected: {0}")]
    CircularDelegation(String),

    #[error("Delegation depth limit of {0} exceeded")]
    DelegationDepthExceeded(usize),

    #[error("Container error: {0}")]
    Container(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for reference resolution
pub type LocateResult<T> = std::result::Result<T, LocateError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

impl ActrunError {
    /// Walk through nested step failures to the error that started them
    pub fn root_cause(&self) -> &ActrunError {
        match self {
            ActrunError::Execution(ExecutionError::StepFailed { source, .. }) => source.root_cause(),
            other => other,
        }
    }

    /// 1-based step indices from the outermost composite to the innermost
    pub fn step_path(&self) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self;
        while let ActrunError::Execution(ExecutionError::StepFailed { index, source, .. }) = current {
            path.push(*index);
            current = source;
        }
        path
    }
}
