//! Execution context for action running
//!
//! A context is the state of one execution level: the scoped environment,
//! the directory of the executing action, and the chain of actions that led
//! here. Delegations run in a child context built from a copy.

use crate::runner::ScopedEnv;
use std::env;
use std::path::PathBuf;

/// Environment variable naming the workspace root
pub const WORKSPACE_VAR: &str = "GITHUB_WORKSPACE";

/// Execution context for one action level
#[derive(Debug, Clone)]
pub struct Context {
    /// Scoped environment for this level
    pub env: ScopedEnv,

    /// Directory of the executing action
    pub action_path: PathBuf,

    /// Workspace (repository) root
    pub workspace: PathBuf,

    /// Identities of the actions being executed, outermost first
    pub action_stack: Vec<String>,

    /// Verbosity level
    pub verbosity: Verbosity,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Context {
    /// Create a context seeded from the process environment
    pub fn new() -> Self {
        Self::from_env(ScopedEnv::from_process())
    }

    /// Create a context around an explicit seed environment
    ///
    /// The workspace is the seed's `$GITHUB_WORKSPACE` when set, otherwise the
    /// current directory.
    pub fn from_env(env: ScopedEnv) -> Self {
        let workspace = env
            .get(WORKSPACE_VAR)
            .filter(|w| !w.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        Context {
            action_path: workspace.clone(),
            workspace,
            env,
            action_stack: Vec::new(),
            verbosity: Verbosity::Normal,
        }
    }

    /// Set the workspace root
    pub fn with_workspace(mut self, dir: PathBuf) -> Self {
        self.workspace = dir;
        self
    }

    /// Set the executing action's directory
    pub fn with_action_path(mut self, dir: PathBuf) -> Self {
        self.action_path = dir;
        self
    }

    /// Replace the scoped environment
    pub fn with_env(mut self, env: ScopedEnv) -> Self {
        self.env = env;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Context for a delegated action: copied environment, its own action path
    pub fn child(&self, action_path: PathBuf, env: ScopedEnv) -> Self {
        Context {
            env,
            action_path,
            workspace: self.workspace.clone(),
            action_stack: self.action_stack.clone(),
            verbosity: self.verbosity,
        }
    }

    /// Push an action onto the execution stack
    pub fn push_action(&mut self, identity: String) {
        self.action_stack.push(identity);
    }

    /// Pop an action from the execution stack
    pub fn pop_action(&mut self) -> Option<String> {
        self.action_stack.pop()
    }

    /// Check if an action is in the execution stack (detect recursion)
    pub fn is_action_in_stack(&self, identity: &str) -> bool {
        self.action_stack.iter().any(|a| a == identity)
    }

    /// Get the current action identity (top of stack)
    pub fn current_action(&self) -> Option<&String> {
        self.action_stack.last()
    }

    /// Number of nested actions being executed
    pub fn depth(&self) -> usize {
        self.action_stack.len()
    }

    /// Resolve a step's working directory against the workspace
    pub fn working_dir(&self, dir: Option<&str>) -> PathBuf {
        match dir {
            Some(dir) if !dir.trim().is_empty() => self.workspace.join(dir.trim()),
            _ => self.workspace.clone(),
        }
    }

    /// Whether captured output should be echoed
    pub fn echo_output(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
