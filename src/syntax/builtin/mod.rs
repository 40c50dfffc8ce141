//! Built-in grammar definitions
//!
//! This module provides grammar definitions for a few common languages.
//! More can be loaded from TOML files at runtime.

mod c;
mod shell;

use super::definition::GrammarDef;

pub use c::c_definition;
pub use shell::shell_definition;

/// Get all built-in grammar definitions
pub fn all_definitions() -> Vec<GrammarDef> {
    vec![c::c_definition(), shell::shell_definition()]
}
