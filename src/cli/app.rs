//! Main CLI application

use crate::config::load_action;
use crate::runner::{
    absolute_normalized, Attestation, Context, Engine, ScopedEnv, ShellRunner, Verbosity,
    WORKSPACE_VAR,
};
use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("actrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run composite actions locally")
        .arg(
            Arg::new("action")
                .value_name("ACTION_DIR")
                .help("Directory containing action.yml")
                .default_value("."),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("NAME=VALUE")
                .help("Set an action input (repeatable)")
                .value_parser(parse_input)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("workspace")
                .short('w')
                .long("workspace")
                .value_name("DIR")
                .help("Workspace root [default: $GITHUB_WORKSPACE or current directory]"),
        )
        .arg(
            Arg::new("env-file")
                .long("env-file")
                .value_name("FILE")
                .help("Load additional environment variables from a dotenv file"),
        )
        .arg(
            Arg::new("attest-binary")
                .long("attest-binary")
                .value_name("PATH")
                .help("Run every script step through this binary"),
        )
        .arg(
            Arg::new("attest-option")
                .long("attest-option")
                .value_name("OPTION")
                .help("Option passed to the attestation binary (repeatable)")
                .allow_hyphen_values(true)
                .requires("attest-binary")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print action output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
}

/// Get verbosity level from matches
pub fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Parse a `NAME=VALUE` input assignment
fn parse_input(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

/// Seed environment: process environment, then env file, then inputs
fn seed_env(matches: &ArgMatches) -> anyhow::Result<ScopedEnv> {
    let mut env = ScopedEnv::from_process();

    if let Some(path) = matches.get_one::<String>("env-file") {
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| anyhow!("Failed to open env file {}: {}", path, e))?;
        for entry in entries {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to parse env file {}: {}", path, e))?;
            env.set(key, value);
        }
    }

    if let Some(inputs) = matches.get_many::<(String, String)>("input") {
        for (name, value) in inputs {
            env.set_input(name, value);
        }
    }

    if let Some(workspace) = matches.get_one::<String>("workspace") {
        env.set(WORKSPACE_VAR, absolute_normalized(Path::new(workspace)).display().to_string());
    }

    Ok(env)
}

fn shell_runner(matches: &ArgMatches) -> ShellRunner {
    match matches.get_one::<String>("attest-binary") {
        Some(binary) => ShellRunner::new().with_attestation(Attestation {
            binary: PathBuf::from(binary),
            options: matches
                .get_many::<String>("attest-option")
                .map(|opts| opts.cloned().collect())
                .unwrap_or_default(),
        }),
        None => ShellRunner::new(),
    }
}

/// Run the action selected by already-parsed arguments
pub fn run_with(matches: &ArgMatches) -> anyhow::Result<()> {
    let verbosity = get_verbosity(matches);
    let action_dir = matches
        .get_one::<String>("action")
        .map(|dir| absolute_normalized(Path::new(dir)))
        .unwrap_or_else(|| absolute_normalized(Path::new(".")));

    let (action, metadata) = load_action(&action_dir)?;
    debug!("Loaded {}", metadata.display());

    let mut ctx = Context::from_env(seed_env(matches)?)
        .with_action_path(action_dir)
        .with_verbosity(verbosity);

    let engine = Engine::new().with_executor(shell_runner(matches));
    let outcome = engine.execute_action(&action, &mut ctx)?;

    for (name, value) in &outcome.outputs {
        info!("Output {}={}", name, value);
    }

    // Verbose mode already echoed every step
    if verbosity != Verbosity::Silent && verbosity != Verbosity::Verbose {
        print!("{}", outcome.output);
    }

    Ok(())
}
