//! Action metadata parsing and validation
//!
//! This module handles parsing of action.yml metadata files
//! and classification of the action they describe.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
