//! Composite step interpretation
//!
//! A composite action runs its steps in order. Script steps go to the shell
//! executor; `uses:` steps are located and run through the engine again in a
//! child context. Captured outputs feed later steps via `${{ steps.* }}`.

use crate::config::{validate_steps, ActionDescriptor, ShellKind, Step};
use crate::error::{ActrunError, ExecutionError, Result};
use crate::runner::{
    locate, parse_key_value_file, parse_set_output_markers, prepare_inputs, substitute,
    substitute_map, Context, Engine, ScopedEnv, StepOutputs, SubstitutionContext,
};
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Environment variable naming the step output file
pub const OUTPUT_VAR: &str = "GITHUB_OUTPUT";

/// Alternate name for the step output file
pub const OUTPUT_FILE_VAR: &str = "OUTPUT_FILE";

/// Environment variable naming the environment update file
pub const ENV_FILE_VAR: &str = "GITHUB_ENV";

/// Environment variable naming the executing action's directory
pub const ACTION_PATH_VAR: &str = "GITHUB_ACTION_PATH";

/// Result of running a composite action's steps
#[derive(Debug, Clone, Default)]
pub struct CompositeRun {
    /// Concatenated output of every step
    pub output: String,

    /// Outputs captured from steps with an id
    pub outputs: StepOutputs,
}

/// Temporary files a step writes its outputs and environment updates to
pub struct StepFiles {
    output: NamedTempFile,
    env: NamedTempFile,
}

impl StepFiles {
    pub fn create() -> std::io::Result<Self> {
        Ok(StepFiles {
            output: tempfile::Builder::new().prefix("actrun-output-").tempfile()?,
            env: tempfile::Builder::new().prefix("actrun-env-").tempfile()?,
        })
    }

    /// Copy of `env` pointing the file variables at these files
    pub fn step_env(&self, env: &ScopedEnv, action_path: &Path) -> ScopedEnv {
        let mut step_env = env.clone();
        let output = self.output.path().display().to_string();
        step_env.set(OUTPUT_VAR, output.clone());
        step_env.set(OUTPUT_FILE_VAR, output);
        step_env.set(ENV_FILE_VAR, self.env.path().display().to_string());
        step_env.set(ACTION_PATH_VAR, action_path.display().to_string());
        step_env
    }

    /// Outputs appended to the output file
    pub fn read_outputs(&self) -> std::io::Result<Vec<(String, String)>> {
        Ok(parse_key_value_file(&fs::read_to_string(self.output.path())?))
    }

    /// Variables appended to the environment file
    pub fn read_env(&self) -> std::io::Result<Vec<(String, String)>> {
        Ok(parse_key_value_file(&fs::read_to_string(self.env.path())?))
    }

    /// Remove both files, logging failures
    pub fn close(self) {
        for file in [self.output, self.env] {
            if let Err(e) = file.close() {
                warn!("Failed to remove step file: {}", e);
            }
        }
    }
}

/// What one step produced
struct StepResult {
    output: String,
    /// Captured outputs, lowest precedence first
    outputs: Vec<(String, String)>,
}

impl Engine {
    /// Run the steps of a composite action
    ///
    /// Declared defaults are applied to `ctx.env` first. Any failure aborts
    /// the remaining steps and is reported as [`ExecutionError::StepFailed`]
    /// with the 1-based index of the failing step.
    pub fn execute_composite_steps(&self, action: &ActionDescriptor, ctx: &mut Context) -> Result<CompositeRun> {
        let name = action.display_name();
        let steps = action.steps();
        validate_steps(name, steps)?;

        let applied = prepare_inputs(&mut ctx.env, &action.inputs, name);
        if !applied.is_empty() {
            debug!("Applied defaults for {}: {}", name, applied.join(", "));
        }

        let mut run = CompositeRun::default();

        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            let result = self
                .execute_step(action, step, ctx, &run.outputs)
                .map_err(|e| ExecutionError::StepFailed {
                    index,
                    name: step.name.clone(),
                    source: Box::new(e),
                })?;

            let Some(result) = result else {
                continue;
            };

            if let Some(id) = &step.id {
                for (output_name, value) in result.outputs {
                    ctx.env.set(output_name.clone(), value.clone());
                    run.outputs.record(id, &output_name, value);
                }
            }
            run.output.push_str(&result.output);
        }

        Ok(run)
    }

    fn execute_step(
        &self,
        action: &ActionDescriptor,
        step: &Step,
        ctx: &mut Context,
        outputs: &StepOutputs,
    ) -> Result<Option<StepResult>> {
        info!("Step: {}", step.label());

        let result = match (&step.run, &step.uses) {
            (Some(script), _) => self.run_script_step(action, step, script, ctx, outputs)?,
            (None, Some(uses)) => self.run_delegate_step(action, step, uses, ctx, outputs)?,
            (None, None) => {
                warn!("Step '{}' has neither run nor uses, skipping", step.label());
                return Ok(None);
            }
        };

        if ctx.echo_output() {
            eprint!("{}", result.output);
        }
        Ok(Some(result))
    }

    fn run_script_step(
        &self,
        action: &ActionDescriptor,
        step: &Step,
        script: &str,
        ctx: &mut Context,
        outputs: &StepOutputs,
    ) -> Result<StepResult> {
        let shell = ShellKind::parse(step.shell.as_deref())?;
        let sub_ctx = SubstitutionContext {
            env: &ctx.env,
            outputs,
            inputs: &action.inputs,
            action_path: &ctx.action_path,
        };

        let script = substitute(script, &sub_ctx);
        let step_vars = substitute_map(&step.env, &sub_ctx);
        let work_dir = ctx.working_dir(
            step.working_directory
                .as_deref()
                .map(|dir| substitute(dir, &sub_ctx))
                .as_deref(),
        );

        let files = StepFiles::create()?;
        let mut env = files.step_env(&ctx.env, &ctx.action_path);
        env.extend(step_vars);

        let captured = self
            .executor()
            .run(&script, &work_dir, &env, shell)
            .map_err(ActrunError::from)
            .and_then(|output| -> Result<_> {
                let mut outputs = parse_set_output_markers(&output);
                outputs.extend(files.read_outputs()?);
                Ok((output, outputs, files.read_env()?))
            });
        files.close();

        let (output, outputs, env_updates) = captured?;
        for (key, value) in env_updates {
            debug!("Setting {} for later steps", key);
            ctx.env.set(key, value);
        }

        Ok(StepResult { output, outputs })
    }

    fn run_delegate_step(
        &self,
        action: &ActionDescriptor,
        step: &Step,
        uses: &str,
        ctx: &mut Context,
        outputs: &StepOutputs,
    ) -> Result<StepResult> {
        let sub_ctx = SubstitutionContext {
            env: &ctx.env,
            outputs,
            inputs: &action.inputs,
            action_path: &ctx.action_path,
        };

        let mut child_env = ctx.env.without_inputs();
        for (name, value) in &step.with {
            child_env.set_input(name, &substitute(value, &sub_ctx));
        }

        let location = locate(uses, &ctx.action_path, &ctx.workspace, self.fetcher())?;
        debug!("Delegating to {}", location.identity());

        let result = self.execute_location(&location, child_env, ctx);
        location.cleanup();
        let outcome = result?;

        // declared outputs override markers of the same name
        let mut captured = parse_set_output_markers(&outcome.output);
        captured.extend(outcome.outputs);

        Ok(StepResult {
            output: outcome.output,
            outputs: captured,
        })
    }
}
