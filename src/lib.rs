//! actrun - run composite actions locally
//!
//! actrun interprets action metadata (`action.yml`) outside a hosted runner:
//! composite steps run in order, nested `uses:` references are resolved and
//! executed recursively, and step outputs flow between steps through the
//! `${{ }}` expression forms.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use error::{ActrunError, Result};
pub use runner::{execute_action, Engine};

/// Current version of actrun
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
