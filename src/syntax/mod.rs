//! Syntax highlighting module
//!
//! This module provides the context-stack highlighting engine:
//! - Grammar model and TOML definitions
//! - Rule matching and the per-line scan
//! - Line states, persistent-state memoization and fold tracking
//! - Grammar management and per-document caching

mod builtin;
mod default_style;
mod definition;
mod grammar;
mod highlighter;
mod manager;
mod progress;
mod rules;
mod state;
mod style;

pub use builtin::{all_definitions, c_definition, shell_definition};
pub use default_style::DefaultStyle;
pub use definition::{ContextDef, GrammarDef, ItemDataDef, KeywordListDef, RuleDef};
pub use grammar::{
    Context, ContextId, Grammar, ItemData, KeywordList, KeywordListId, Transition,
    DEFAULT_DELIMITERS,
};
pub use highlighter::{Diagnostics, HighlightedLine, Highlighter, PersistentStates, StackEntry};
pub use manager::{DocumentHighlighter, SyntaxManager};
pub use progress::ProgressData;
pub use rules::{CharPattern, RegexRule, Rule, RuleKind};
pub use state::{FoldInfo, LineData, LineState, ObservableState, PERSISTENT_START};
pub use style::{Color, Span, Style, StyleName};
