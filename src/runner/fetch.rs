//! Hosted action retrieval
//!
//! Hosted actions are cloned into a temporary directory that is removed when
//! the delegation finishes, whether it succeeded or not.

use crate::error::{LocateError, LocateResult};
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Environment variable naming the server hosted actions are cloned from
pub const SERVER_URL_VAR: &str = "GITHUB_SERVER_URL";

/// Default server for hosted actions
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Retrieves hosted actions into directories the caller owns
pub trait ActionFetcher {
    fn fetch(&self, owner: &str, repo: &str, git_ref: &str) -> LocateResult<FetchedAction>;
}

/// A retrieved action checkout, removed on close or drop
#[derive(Debug)]
pub struct FetchedAction {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl FetchedAction {
    /// Take ownership of a temporary directory
    pub fn new(dir: TempDir) -> Self {
        let path = dir.path().to_path_buf();
        Self {
            dir: Some(dir),
            path,
        }
    }

    /// Root of the checkout
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the checkout now, logging a failure instead of returning it
    pub fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!("Removing retrieved action at {}", self.path.display());
            if let Err(e) = dir.close() {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for FetchedAction {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Fetches actions with the `git` command line
#[derive(Debug, Clone)]
pub struct GitFetcher {
    server_url: String,
}

impl GitFetcher {
    /// Fetcher for a specific server
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetcher for `$GITHUB_SERVER_URL`, defaulting to github.com
    pub fn from_env() -> Self {
        let server = std::env::var(SERVER_URL_VAR)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Self::new(server)
    }

    /// Clone URL of a repository
    pub fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}", self.server_url, owner, repo)
    }

    fn shallow_clone(&self, url: &str, git_ref: &str, dest: &Path) -> Result<(), String> {
        run_git(
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                git_ref,
                url,
                &dest.to_string_lossy(),
            ],
            None,
        )
    }

    fn full_clone(&self, url: &str, git_ref: &str, dest: &Path) -> Result<(), String> {
        run_git(&["clone", url, &dest.to_string_lossy()], None)?;
        run_git(&["checkout", git_ref], Some(dest))
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ActionFetcher for GitFetcher {
    fn fetch(&self, owner: &str, repo: &str, git_ref: &str) -> LocateResult<FetchedAction> {
        let failed = |error: String| LocateError::FetchFailed {
            owner: owner.to_string(),
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
            error,
        };

        let dir = tempfile::Builder::new()
            .prefix("actrun-action-")
            .tempdir()
            .map_err(|e| failed(e.to_string()))?;
        let fetched = FetchedAction::new(dir);
        let url = self.repo_url(owner, repo);

        // Shallow clone only works for branch and tag names
        if let Err(shallow_err) = self.shallow_clone(&url, git_ref, fetched.path()) {
            debug!(
                "Shallow clone of {}@{} failed, falling back to full clone: {}",
                url, git_ref, shallow_err
            );
            clear_dir(fetched.path()).map_err(|e| failed(e.to_string()))?;
            self.full_clone(&url, git_ref, fetched.path())
                .map_err(|full_err| failed(format!("{}; {}", shallow_err.trim(), full_err.trim())))?;
        }

        Ok(fetched)
    }
}

fn run_git(args: &[&str], dir: Option<&Path>) -> Result<(), String> {
    let mut cmd = StdCommand::new("git");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .map_err(|e| format!("failed to run git: {}", e))?;
    if !output.status.success() {
        return Err(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}

/// Remove everything inside a directory, keeping the directory
fn clear_dir(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
