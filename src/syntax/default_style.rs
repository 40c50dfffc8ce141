//! Abstract default styles
//!
//! Every item data in a grammar names one of these. A default style carries
//! the base `Style` that item-data overrides are applied on top of.

use super::style::{Color, Style};

/// Abstract style categories an item data can inherit from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DefaultStyle {
    /// Plain text
    #[default]
    Normal,
    /// Language keywords
    Keyword,
    /// Built-in type names
    DataType,
    /// Decimal integers
    DecVal,
    /// Octal and hexadecimal integers
    BaseN,
    /// Floating point literals
    Float,
    /// Character literals
    Char,
    /// String literals
    String,
    /// Comments
    Comment,
    /// Anything else worth marking (preprocessor, escapes)
    Others,
    /// TODO/FIXME style markers
    Alert,
    /// Function names
    Function,
    /// Explicit fold region markers
    RegionMarker,
    /// Syntax errors
    Error,
}

impl DefaultStyle {
    /// Get the base style for this category
    pub fn base_style(&self) -> Style {
        match self {
            DefaultStyle::Normal => Style::default(),
            DefaultStyle::Keyword => Style::fg(Color::Magenta).with_bold(),
            DefaultStyle::DataType => Style::fg(Color::Yellow),
            DefaultStyle::DecVal => Style::fg(Color::Cyan),
            DefaultStyle::BaseN => Style::fg(Color::BrightCyan),
            DefaultStyle::Float => Style::fg(Color::Cyan),
            DefaultStyle::Char => Style::fg(Color::Green),
            DefaultStyle::String => Style::fg(Color::Green),
            DefaultStyle::Comment => Style::fg(Color::BrightBlack).with_italic(),
            DefaultStyle::Others => Style::fg(Color::BrightMagenta),
            DefaultStyle::Alert => Style::fg(Color::Black).with_bg(Color::BrightYellow),
            DefaultStyle::Function => Style::fg(Color::Blue),
            DefaultStyle::RegionMarker => Style::fg(Color::BrightBlue).with_underline(),
            DefaultStyle::Error => Style::fg(Color::BrightRed).with_underline(),
        }
    }

    /// Get a human-readable name for this category
    pub fn name(&self) -> &'static str {
        match self {
            DefaultStyle::Normal => "Normal",
            DefaultStyle::Keyword => "Keyword",
            DefaultStyle::DataType => "DataType",
            DefaultStyle::DecVal => "DecVal",
            DefaultStyle::BaseN => "BaseN",
            DefaultStyle::Float => "Float",
            DefaultStyle::Char => "Char",
            DefaultStyle::String => "String",
            DefaultStyle::Comment => "Comment",
            DefaultStyle::Others => "Others",
            DefaultStyle::Alert => "Alert",
            DefaultStyle::Function => "Function",
            DefaultStyle::RegionMarker => "RegionMarker",
            DefaultStyle::Error => "Error",
        }
    }

    /// Parse a category from its name, with or without the `ds` prefix
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix("ds").unwrap_or(name);
        match name {
            "Normal" => Some(DefaultStyle::Normal),
            "Keyword" => Some(DefaultStyle::Keyword),
            "DataType" => Some(DefaultStyle::DataType),
            "DecVal" => Some(DefaultStyle::DecVal),
            "BaseN" => Some(DefaultStyle::BaseN),
            "Float" => Some(DefaultStyle::Float),
            "Char" => Some(DefaultStyle::Char),
            "String" => Some(DefaultStyle::String),
            "Comment" => Some(DefaultStyle::Comment),
            "Others" => Some(DefaultStyle::Others),
            "Alert" => Some(DefaultStyle::Alert),
            "Function" => Some(DefaultStyle::Function),
            "RegionMarker" => Some(DefaultStyle::RegionMarker),
            "Error" => Some(DefaultStyle::Error),
            _ => None,
        }
    }
}
