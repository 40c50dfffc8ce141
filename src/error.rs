//! Error types for ctxlight

use thiserror::Error;

/// Result type alias for highlighting operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighting error types
///
/// Reference errors are raised once, when a grammar definition is resolved.
/// The only error a running engine produces is `MatchEngineBroken`.
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown context: {0}")]
    UnknownContext(String),

    #[error("Unknown keyword list: {0}")]
    UnknownKeywordList(String),

    #[error("Unknown item data: {0}")]
    UnknownItemData(String),

    #[error("Invalid regular expression `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid rule in context {context}: {reason}")]
    InvalidRule { context: String, reason: String },

    #[error("Invalid context transition: {0}")]
    InvalidTransition(String),

    #[error("Highlighting engine broken: {0}")]
    MatchEngineBroken(String),

    #[error("{0}")]
    Message(String),
}

impl HighlightError {
    /// Shorthand for a rule definition error
    pub(crate) fn invalid_rule(context: &str, reason: impl Into<String>) -> Self {
        HighlightError::InvalidRule {
            context: context.to_string(),
            reason: reason.into(),
        }
    }
}
