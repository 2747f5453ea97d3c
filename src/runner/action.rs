//! Action execution engine
//!
//! The engine classifies an action and runs it with the handler for its kind.
//! Composite actions come back through here for every delegated step, each in
//! a child context holding a copy of the caller's environment minus its inputs.

use crate::config::{
    load_action, validate_action, ActionDescriptor, ActionKind, Runs, ShellKind,
};
use crate::error::{ExecutionError, Result};
use crate::runner::{
    absolute_normalized, parse_set_output_markers, prepare_inputs, substitute, substitute_list,
    substitute_map, ActionFetcher, ActionLocation, ContainerImage, ContainerRequest,
    ContainerRunner, Context, DockerCli, GitFetcher, ScopedEnv, ShellExecutor, ShellRunner,
    StepFiles, StepOutputs, SubstitutionContext,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Default limit on nested delegations
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Result of running one action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Aggregated output text
    pub output: String,

    /// Declared (composite) or captured (scripted, container) outputs
    pub outputs: BTreeMap<String, String>,
}

/// Runs actions with a set of collaborators
pub struct Engine {
    executor: Box<dyn ShellExecutor>,
    fetcher: Box<dyn ActionFetcher>,
    containers: Box<dyn ContainerRunner>,
    max_depth: usize,
}

impl Engine {
    /// Engine with the process-backed shell, git retrieval and docker
    pub fn new() -> Self {
        Engine {
            executor: Box::new(ShellRunner::new()),
            fetcher: Box::new(GitFetcher::from_env()),
            containers: Box::new(DockerCli::default()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Replace the shell-step executor
    pub fn with_executor(mut self, executor: impl ShellExecutor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    /// Replace the hosted-action retriever
    pub fn with_fetcher(mut self, fetcher: impl ActionFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Replace the container runner
    pub fn with_container_runner(mut self, runner: impl ContainerRunner + 'static) -> Self {
        self.containers = Box::new(runner);
        self
    }

    /// Set the limit on nested delegations
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub(crate) fn executor(&self) -> &dyn ShellExecutor {
        self.executor.as_ref()
    }

    pub(crate) fn fetcher(&self) -> &dyn ActionFetcher {
        self.fetcher.as_ref()
    }

    /// Run an action whose directory is `ctx.action_path`
    pub fn execute_action(&self, action: &ActionDescriptor, ctx: &mut Context) -> Result<ActionOutcome> {
        let identity = absolute_normalized(&ctx.action_path).display().to_string();
        self.execute_action_as(action, ctx, identity)
    }

    /// Run an action under an explicit identity for cycle detection
    pub(crate) fn execute_action_as(
        &self,
        action: &ActionDescriptor,
        ctx: &mut Context,
        identity: String,
    ) -> Result<ActionOutcome> {
        self.enter(ctx, identity)?;
        let result = self.dispatch(action, ctx);
        ctx.pop_action();
        result
    }

    fn enter(&self, ctx: &mut Context, identity: String) -> Result<()> {
        if ctx.is_action_in_stack(&identity) {
            let mut chain = ctx.action_stack.clone();
            chain.push(identity);
            return Err(ExecutionError::CircularDelegation(chain.join(" -> ")).into());
        }
        if ctx.depth() >= self.max_depth {
            return Err(ExecutionError::DelegationDepthExceeded(self.max_depth).into());
        }
        ctx.push_action(identity);
        Ok(())
    }

    fn dispatch(&self, action: &ActionDescriptor, ctx: &mut Context) -> Result<ActionOutcome> {
        let kind = validate_action(action)?;
        info!("Running {} ({:?})", action.display_name(), kind);

        // validate_action fails without a runs section
        let Some(runs) = action.runs.as_ref() else {
            return Ok(ActionOutcome::default());
        };

        match kind {
            ActionKind::Composite => {
                let run = self.execute_composite_steps(action, ctx)?;
                let outputs = resolve_declared_outputs(action, &run.outputs, ctx);
                Ok(ActionOutcome {
                    output: run.output,
                    outputs,
                })
            }
            ActionKind::Scripted => self.run_scripted(action, runs, ctx),
            ActionKind::Containerized => self.run_containerized(action, runs, ctx),
            ActionKind::Unknown(using) => Err(ExecutionError::UnsupportedAction(using).into()),
        }
    }

    /// Run a located delegation in a child context seeded with `env`
    pub(crate) fn execute_location(
        &self,
        location: &ActionLocation,
        env: ScopedEnv,
        parent: &Context,
    ) -> Result<ActionOutcome> {
        match location {
            ActionLocation::Container(image) => {
                let mut child = parent.child(parent.action_path.clone(), env);
                self.enter(&mut child, location.identity())?;
                let request = ContainerRequest {
                    image: ContainerImage::Registry(image.clone()),
                    entrypoint: None,
                    args: Vec::new(),
                    env: BTreeMap::new(),
                    workspace: child.workspace.clone(),
                };
                let output = self.containers.run(&request, &child.env)?;
                Ok(ActionOutcome {
                    outputs: parse_set_output_markers(&output).into_iter().collect(),
                    output,
                })
            }
            ActionLocation::Local(path) | ActionLocation::Hosted { path, .. } => {
                let (action, metadata) = load_action(path)?;
                debug!("Loaded {}", metadata.display());
                let mut child = parent.child(path.clone(), env);
                self.execute_action_as(&action, &mut child, location.identity())
            }
        }
    }

    fn run_scripted(&self, action: &ActionDescriptor, runs: &Runs, ctx: &mut Context) -> Result<ActionOutcome> {
        prepare_inputs(&mut ctx.env, &action.inputs, action.display_name());

        let files = StepFiles::create()?;
        let env = files.step_env(&ctx.env, &ctx.action_path);
        let node = |entry: &str| -> Result<String> {
            let script = format!("node {}", shell_quote(&ctx.action_path.join(entry)));
            let output = self
                .executor
                .run(&script, &ctx.workspace, &env, ShellKind::Sh)?;
            if ctx.echo_output() {
                eprint!("{}", output);
            }
            Ok(output)
        };

        let mut output = String::new();
        if let Some(pre) = &runs.pre {
            output.push_str(&node(pre)?);
        }

        let main = runs.main.as_deref().unwrap_or_default();
        let main_result = node(main);
        // post runs even when main failed; the main failure is reported
        let post_result = runs.post.as_deref().map(node);

        output.push_str(&main_result?);
        if let Some(post) = post_result {
            output.push_str(&post?);
        }

        let mut outputs: BTreeMap<String, String> = parse_set_output_markers(&output).into_iter().collect();
        outputs.extend(files.read_outputs()?);
        for (key, value) in files.read_env()? {
            ctx.env.set(key, value);
        }
        files.close();

        Ok(ActionOutcome { output, outputs })
    }

    fn run_containerized(
        &self,
        action: &ActionDescriptor,
        runs: &Runs,
        ctx: &mut Context,
    ) -> Result<ActionOutcome> {
        prepare_inputs(&mut ctx.env, &action.inputs, action.display_name());

        let outputs = StepOutputs::new();
        let sub_ctx = SubstitutionContext {
            env: &ctx.env,
            outputs: &outputs,
            inputs: &action.inputs,
            action_path: &ctx.action_path,
        };

        let image = runs.image.as_deref().unwrap_or_default();
        let request = ContainerRequest {
            image: ContainerImage::from_image_field(image, &ctx.action_path),
            entrypoint: runs.entrypoint.as_deref().map(|e| substitute(e, &sub_ctx)),
            args: substitute_list(&runs.args, &sub_ctx),
            env: substitute_map(&runs.env, &sub_ctx).into_iter().collect(),
            workspace: ctx.workspace.clone(),
        };

        let output = self.containers.run(&request, &ctx.env)?;
        if ctx.echo_output() {
            eprint!("{}", output);
        }

        Ok(ActionOutcome {
            outputs: parse_set_output_markers(&output).into_iter().collect(),
            output,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a composite action's declared outputs against its step outputs
pub fn resolve_declared_outputs(
    action: &ActionDescriptor,
    step_outputs: &StepOutputs,
    ctx: &Context,
) -> BTreeMap<String, String> {
    let sub_ctx = SubstitutionContext {
        env: &ctx.env,
        outputs: step_outputs,
        inputs: &action.inputs,
        action_path: &ctx.action_path,
    };

    action
        .outputs
        .iter()
        .map(|(name, spec)| (name.clone(), substitute(spec.value().unwrap_or_default(), &sub_ctx)))
        .collect()
}

/// Run an action with the default engine and return its output text
///
/// `root_dir` is the directory of the action. The workspace is the seed's
/// `$GITHUB_WORKSPACE` when set, otherwise `root_dir`.
pub fn execute_action(action: &ActionDescriptor, root_dir: &Path, seed_env: ScopedEnv) -> Result<String> {
    let has_workspace = seed_env
        .get(crate::runner::WORKSPACE_VAR)
        .is_some_and(|w| !w.is_empty());

    let mut ctx = Context::from_env(seed_env).with_action_path(root_dir.to_path_buf());
    if !has_workspace {
        ctx = ctx.with_workspace(root_dir.to_path_buf());
    }

    Engine::new()
        .execute_action(action, &mut ctx)
        .map(|outcome| outcome.output)
}

/// Quote a path for a POSIX shell
pub fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
