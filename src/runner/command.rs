//! Shell step execution
//!
//! This module runs script text under a POSIX shell, optionally wrapped by an
//! attestation binary, and returns the combined output.

use crate::config::ShellKind;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::ScopedEnv;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use tracing::{debug, warn};

/// Runs one script and returns its combined output
///
/// Implementations must fail with [`ExecutionError::CommandFailed`] when the
/// script exits non-zero.
pub trait ShellExecutor {
    fn run(
        &self,
        script: &str,
        work_dir: &Path,
        env: &ScopedEnv,
        shell: ShellKind,
    ) -> ExecutionResult<String>;
}

/// External binary that every step is routed through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// Path to the wrapping binary
    pub binary: PathBuf,

    /// Options passed before the wrapped command, unchanged
    pub options: Vec<String>,
}

/// Process-backed shell executor
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    attestation: Option<Attestation>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every script through an attestation binary
    pub fn with_attestation(mut self, attestation: Attestation) -> Self {
        self.attestation = Some(attestation);
        self
    }

    pub fn attestation(&self) -> Option<&Attestation> {
        self.attestation.as_ref()
    }

    /// Program and arguments that run a script file
    pub fn invocation(&self, shell: ShellKind, script_path: &Path) -> (String, Vec<String>) {
        let shell_cmd = shell.command();
        let mut wrapped: Vec<String> = shell_cmd[1..].iter().map(|s| s.to_string()).collect();
        wrapped.push(script_path.display().to_string());

        match &self.attestation {
            Some(attestation) => {
                let mut args = attestation.options.clone();
                args.push("--".to_string());
                args.push(shell_cmd[0].to_string());
                args.extend(wrapped);
                (attestation.binary.display().to_string(), args)
            }
            None => (shell_cmd[0].to_string(), wrapped),
        }
    }
}

impl ShellExecutor for ShellRunner {
    fn run(
        &self,
        script: &str,
        work_dir: &Path,
        env: &ScopedEnv,
        shell: ShellKind,
    ) -> ExecutionResult<String> {
        let mut script_file = tempfile::Builder::new()
            .prefix("actrun-step-")
            .suffix(".sh")
            .tempfile()
            .map_err(|e| spawn_error("script file", e))?;
        script_file
            .write_all(script.as_bytes())
            .and_then(|_| script_file.flush())
            .map_err(|e| spawn_error("script file", e))?;

        let (program, args) = self.invocation(shell, script_file.path());
        debug!("Executing {} {}", program, args.join(" "));

        let output = run_captured(&program, &args, work_dir, env);

        if let Err(e) = script_file.close() {
            warn!("Failed to remove temporary script: {}", e);
        }

        output
    }
}

/// Run a program with a replaced environment and capture stdout then stderr
pub fn run_captured(
    program: &str,
    args: &[String],
    work_dir: &Path,
    env: &ScopedEnv,
) -> ExecutionResult<String> {
    let output = StdCommand::new(program)
        .args(args)
        .current_dir(work_dir)
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ExecutionError::CommandFailed {
            code: output.status.code(),
            output: text,
        });
    }

    Ok(text)
}

fn spawn_error(program: &str, error: std::io::Error) -> ExecutionError {
    ExecutionError::Spawn {
        program: program.to_string(),
        error: error.to_string(),
    }
}
