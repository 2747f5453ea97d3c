//! Action metadata discovery and parsing

use crate::config::types::ActionDescriptor;
use crate::error::{ActrunError, ConfigError, ConfigResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata file names, in lookup order
pub const ACTION_FILE_NAMES: &[&str] = &["action.yml", "action.yaml"];

/// Find the metadata file inside an action directory
pub fn find_action_file(action_dir: &Path) -> ConfigResult<PathBuf> {
    ACTION_FILE_NAMES
        .iter()
        .map(|name| action_dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigError::MetadataNotFound(action_dir.to_path_buf()))
}

/// Whether a directory contains action metadata
pub fn has_action_file(action_dir: &Path) -> bool {
    find_action_file(action_dir).is_ok()
}

/// Parse action metadata from a string
pub fn parse_action(yaml: &str) -> Result<ActionDescriptor, ActrunError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Parse action metadata from a file path
pub fn parse_action_file(path: &Path) -> Result<ActionDescriptor, ActrunError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e))
    })?;

    parse_action(&contents)
}

/// Load the action in a directory, returning the descriptor and its metadata path
pub fn load_action(action_dir: &Path) -> Result<(ActionDescriptor, PathBuf), ActrunError> {
    let path = find_action_file(action_dir)?;
    let action = parse_action_file(&path)?;
    Ok((action, path))
}
