//! Container action execution
//!
//! The engine prepares a [`ContainerRequest`] (substituted args and env) and
//! hands it to a [`ContainerRunner`]. The default runner drives the `docker`
//! command line.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{run_captured, ScopedEnv, INPUT_PREFIX};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path the workspace is mounted at inside the container
pub const CONTAINER_WORKSPACE: &str = "/github/workspace";

/// Image source of a container action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerImage {
    /// Registry image, pulled by the runtime
    Registry(String),
    /// Dockerfile to build, relative paths resolved against the action
    Dockerfile(PathBuf),
}

impl ContainerImage {
    /// Interpret a `runs.image` value
    pub fn from_image_field(image: &str, action_dir: &Path) -> Self {
        match image.strip_prefix("docker://") {
            Some(reference) => ContainerImage::Registry(reference.to_string()),
            None => ContainerImage::Dockerfile(action_dir.join(image)),
        }
    }
}

/// Everything needed to run one container action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub image: ContainerImage,
    pub entrypoint: Option<String>,
    pub args: Vec<String>,
    /// Variables declared by the action, already substituted
    pub env: BTreeMap<String, String>,
    pub workspace: PathBuf,
}

/// Runs container actions
pub trait ContainerRunner {
    fn run(&self, request: &ContainerRequest, env: &ScopedEnv) -> ExecutionResult<String>;
}

/// Container runner backed by the `docker` command line
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Tag used for images built from a Dockerfile
    pub fn build_tag(dockerfile: &Path) -> String {
        let name = dockerfile
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "action".to_string());
        let name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
            .collect();
        format!("actrun-{}:local", name)
    }

    /// Arguments for `docker run`
    pub fn run_args(&self, image: &str, request: &ContainerRequest, env: &ScopedEnv) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{}", request.workspace.display(), CONTAINER_WORKSPACE),
            "-w".to_string(),
            CONTAINER_WORKSPACE.to_string(),
        ];

        // Values travel through the process environment, names on the command line
        let mut forwarded: Vec<&str> = env
            .iter()
            .map(|(key, _)| key.as_str())
            .filter(|key| key.starts_with(INPUT_PREFIX) || key.starts_with("GITHUB_"))
            .collect();
        forwarded.extend(request.env.keys().map(String::as_str));
        forwarded.sort_unstable();
        forwarded.dedup();
        for key in forwarded {
            args.push("-e".to_string());
            args.push(key.to_string());
        }

        if let Some(entrypoint) = &request.entrypoint {
            args.push("--entrypoint".to_string());
            args.push(entrypoint.clone());
        }

        args.push(image.to_string());
        args.extend(request.args.iter().cloned());
        args
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerRunner for DockerCli {
    fn run(&self, request: &ContainerRequest, env: &ScopedEnv) -> ExecutionResult<String> {
        let mut output = String::new();

        let image = match &request.image {
            ContainerImage::Registry(image) => image.clone(),
            ContainerImage::Dockerfile(dockerfile) => {
                let tag = Self::build_tag(dockerfile);
                let context = dockerfile.parent().unwrap_or_else(|| Path::new("."));
                let args = vec![
                    "build".to_string(),
                    "-t".to_string(),
                    tag.clone(),
                    "-f".to_string(),
                    dockerfile.display().to_string(),
                    context.display().to_string(),
                ];
                debug!("Building container image {}", tag);
                output.push_str(&self.invoke(&args, &request.workspace, env)?);
                tag
            }
        };

        let mut run_env = env.clone();
        run_env.extend(request.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let args = self.run_args(&image, request, &run_env);
        debug!("Running container {}", image);
        output.push_str(&self.invoke(&args, &request.workspace, &run_env)?);
        Ok(output)
    }
}

impl DockerCli {
    fn invoke(&self, args: &[String], work_dir: &Path, env: &ScopedEnv) -> ExecutionResult<String> {
        run_captured(&self.program, args, work_dir, env).map_err(|e| match e {
            ExecutionError::CommandFailed { code, output } => ExecutionError::Container(format!(
                "{} {} exited with {:?}: {}",
                self.program,
                args.first().map(String::as_str).unwrap_or_default(),
                code,
                output.trim()
            )),
            other => other,
        })
    }
}
