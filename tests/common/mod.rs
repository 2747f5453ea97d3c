//! Common test utilities

#![allow(dead_code)]

use actrun::runner::{Context, ScopedEnv, WORKSPACE_VAR};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create an empty workspace directory
pub fn create_workspace() -> TempDir {
    TempDir::new().unwrap()
}

/// Write `action.yml` into `root/rel`, creating directories as needed
pub fn write_action(root: &Path, rel: &str, content: &str) -> PathBuf {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("action.yml"), content).unwrap();
    dir
}

/// Process environment with the workspace and the given inputs
pub fn seed_env(workspace: &Path, inputs: &[(&str, &str)]) -> ScopedEnv {
    let mut env = ScopedEnv::from_process();
    env.set(WORKSPACE_VAR, workspace.display().to_string());
    for (name, value) in inputs {
        env.set_input(name, value);
    }
    env
}

/// Context for running the action in `action_dir`
pub fn context_for(workspace: &Path, action_dir: &Path, inputs: &[(&str, &str)]) -> Context {
    Context::from_env(seed_env(workspace, inputs)).with_action_path(action_dir.to_path_buf())
}
