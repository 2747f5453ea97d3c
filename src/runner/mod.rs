//! Action execution engine
//!
//! This module handles running actions: environment scoping, expression
//! substitution, reference resolution, composite step interpretation and the
//! external collaborators (shell, git, container runtime).

pub mod action;
pub mod command;
pub mod composite;
pub mod container;
pub mod context;
pub mod defaults;
pub mod env;
pub mod fetch;
pub mod interpolate;
pub mod locate;
pub mod outputs;

// Re-export main types
pub use action::*;
pub use command::*;
pub use composite::*;
pub use container::*;
pub use context::*;
pub use defaults::*;
pub use env::*;
pub use fetch::*;
pub use interpolate::*;
pub use locate::*;
pub use outputs::*;
