//! ctxlight - line-oriented, incremental context-stack syntax highlighting
//!
//! A grammar is a set of named contexts, each holding an ordered list of
//! matching rules. A `Highlighter` scans one line at a time, carrying the
//! context stack from line to line through a small `LineData` value, so a
//! host can re-highlight any line given only the line before it.

pub mod config;
pub mod error;
pub mod syntax;

pub use config::{Config, EngineConfig};
pub use error::{HighlightError, Result};
pub use syntax::{
    DocumentHighlighter, Grammar, GrammarDef, HighlightedLine, Highlighter, LineData, Span,
    SyntaxManager,
};
