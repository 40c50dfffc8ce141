//! Grammar model
//!
//! A `Grammar` is the resolved, read-only description of a language: its
//! contexts, keyword lists, item data and delimiter set. It is built once by
//! `Grammar::from_def` and then shared (behind an `Arc`) by every engine
//! highlighting a document in that language.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{HighlightError, Result};

use super::default_style::DefaultStyle;
use super::rules::Rule;
use super::style::{Color, Style, StyleName};

/// Delimiters used when a grammar does not adjust them
pub const DEFAULT_DELIMITERS: &str = " \t.():!+,-<=>%&*/;?[]^{|}~\\";

/// Index of a context inside its grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) usize);

impl ContextId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Index of a keyword list inside its grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeywordListId(pub(crate) usize);

/// A resolved context-stack transition
///
/// Written in definitions as `#stay`, one or more `#pop` optionally followed
/// by `!Name`, or a bare context name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    #[default]
    Stay,
    Pop {
        count: usize,
        then: Option<ContextId>,
    },
    Push(ContextId),
}

impl Transition {
    /// Parse a transition string, resolving context names with `resolve`
    pub fn parse<F>(target: &str, resolve: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<ContextId>,
    {
        let target = target.trim();
        if target.is_empty() || target == "#stay" {
            return Ok(Transition::Stay);
        }

        if target.starts_with("#pop") {
            let mut rest = target;
            let mut count = 0;
            while let Some(tail) = rest.strip_prefix("#pop") {
                count += 1;
                rest = tail;
            }
            let then = match rest {
                "" => None,
                _ => match rest.strip_prefix('!') {
                    Some(name) if !name.is_empty() => Some(resolve(name)?),
                    _ => return Err(HighlightError::InvalidTransition(target.to_string())),
                },
            };
            return Ok(Transition::Pop { count, then });
        }

        if target.starts_with('#') {
            return Err(HighlightError::InvalidTransition(target.to_string()));
        }
        Ok(Transition::Push(resolve(target)?))
    }

    /// Whether this transition leaves the stack untouched
    pub fn is_stay(&self) -> bool {
        matches!(self, Transition::Stay)
    }
}

/// A named lexer mode holding the rules active while it is on top of the stack
#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) id: ContextId,
    pub(crate) name: Arc<str>,
    pub(crate) style: StyleName,
    pub(crate) rules: Vec<Rule>,
    pub(crate) line_begin: Transition,
    pub(crate) line_end: Transition,
    pub(crate) line_empty: Option<Transition>,
    /// Set when the context falls through instead of styling unmatched text
    pub(crate) fallthrough: Option<Transition>,
    pub(crate) dynamic: bool,
    /// Captures this instance was built from (dynamic instances only)
    pub(crate) captures: Option<Vec<String>>,
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Item data applied to text no rule claims
    pub fn style(&self) -> &StyleName {
        &self.style
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn line_begin(&self) -> Transition {
        self.line_begin
    }

    pub fn line_end(&self) -> Transition {
        self.line_end
    }

    pub fn line_empty(&self) -> Option<Transition> {
        self.line_empty
    }

    pub fn is_fallthrough(&self) -> bool {
        self.fallthrough.is_some()
    }

    pub fn fallthrough(&self) -> Option<Transition> {
        self.fallthrough
    }

    /// True if any rule carries capture placeholders
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Captures of a dynamic instance, `None` for grammar contexts
    pub fn captures(&self) -> Option<&[String]> {
        self.captures.as_deref()
    }

    /// Clone this context with every dynamic rule filled in from `captures`
    ///
    /// Returns the instance and the number of rules whose generated regex
    /// failed to compile (those rules never match).
    pub fn instantiate(&self, captures: &[String]) -> (Context, usize) {
        let mut failures = 0;
        let rules = self
            .rules
            .iter()
            .map(|rule| rule.instantiate(captures, &mut failures))
            .collect();
        let instance = Context {
            rules,
            captures: Some(captures.to_vec()),
            ..self.clone()
        };
        (instance, failures)
    }

    /// Identity of this context inside a stack signature
    pub fn signature(&self) -> String {
        match &self.captures {
            None => self.name.to_string(),
            Some(captures) => {
                let mut sig = String::with_capacity(self.name.len() + 16);
                sig.push_str(&self.name);
                for capture in captures {
                    sig.push('\u{1d}');
                    sig.push_str(capture);
                }
                sig
            }
        }
    }
}

/// Display attributes for a style name
///
/// Each override is three-valued: `None` keeps whatever the base style says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemData {
    pub name: StyleName,
    pub default_style: DefaultStyle,
    pub color: Option<Color>,
    pub background: Option<Color>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike_out: Option<bool>,
}

impl ItemData {
    /// Item data with no overrides
    pub fn new(name: &str, default_style: DefaultStyle) -> Self {
        Self {
            name: StyleName::from(name),
            default_style,
            color: None,
            background: None,
            bold: None,
            italic: None,
            underline: None,
            strike_out: None,
        }
    }

    /// Whether any attribute is explicitly customized
    pub fn is_customized(&self) -> bool {
        self.color.is_some()
            || self.background.is_some()
            || self.bold.is_some()
            || self.italic.is_some()
            || self.underline.is_some()
            || self.strike_out.is_some()
    }

    /// Apply the explicitly set attributes on top of `base`
    pub fn apply(&self, base: Style) -> Style {
        Style {
            fg: self.color.unwrap_or(base.fg),
            bg: self.background.unwrap_or(base.bg),
            bold: self.bold.unwrap_or(base.bold),
            italic: self.italic.unwrap_or(base.italic),
            underline: self.underline.unwrap_or(base.underline),
            strike_out: self.strike_out.unwrap_or(base.strike_out),
        }
    }

    /// Resolve against this item's own default style
    pub fn resolve(&self) -> Style {
        self.apply(self.default_style.base_style())
    }
}

/// A named set of literal words
#[derive(Debug, Clone)]
pub struct KeywordList {
    name: String,
    words: HashSet<String>,
    folded: HashSet<String>,
    case_sensitive: Option<bool>,
}

impl KeywordList {
    pub fn new<I, S>(name: &str, words: I, case_sensitive: Option<bool>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words.into_iter().map(Into::into).collect();
        let folded = words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            name: name.to_string(),
            words,
            folded,
            case_sensitive,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Membership test; the list's own sensitivity wins over `default_sensitive`
    pub fn contains(&self, word: &str, default_sensitive: bool) -> bool {
        if self.case_sensitive.unwrap_or(default_sensitive) {
            self.words.contains(word)
        } else {
            self.folded.contains(&word.to_lowercase())
        }
    }
}

/// A resolved language grammar
#[derive(Debug)]
pub struct Grammar {
    pub(crate) name: String,
    pub(crate) extensions: Vec<String>,
    pub(crate) contexts: Vec<Context>,
    pub(crate) context_ids: HashMap<String, ContextId>,
    pub(crate) keyword_lists: Vec<KeywordList>,
    pub(crate) keyword_ids: HashMap<String, KeywordListId>,
    pub(crate) item_datas: HashMap<String, ItemData>,
    pub(crate) initial: ContextId,
    pub(crate) case_sensitive: bool,
    pub(crate) delimiters: HashSet<char>,
}

impl Grammar {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Look up a context by name
    pub fn context(&self, name: &str) -> Result<&Context> {
        self.context_ids
            .get(name)
            .and_then(|id| self.contexts.get(id.0))
            .ok_or_else(|| HighlightError::UnknownContext(name.to_string()))
    }

    pub fn context_by_id(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(id.0)
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// The context every document starts in
    pub fn initial_context(&self) -> &Context {
        &self.contexts[self.initial.0]
    }

    pub fn initial_id(&self) -> ContextId {
        self.initial
    }

    pub fn keyword_list(&self, id: KeywordListId) -> Option<&KeywordList> {
        self.keyword_lists.get(id.0)
    }

    pub fn keyword_list_named(&self, name: &str) -> Result<&KeywordList> {
        self.keyword_ids
            .get(name)
            .and_then(|id| self.keyword_lists.get(id.0))
            .ok_or_else(|| HighlightError::UnknownKeywordList(name.to_string()))
    }

    pub fn item_data(&self, name: &str) -> Result<&ItemData> {
        self.item_datas
            .get(name)
            .ok_or_else(|| HighlightError::UnknownItemData(name.to_string()))
    }

    /// Concrete style for a style name; unknown names render as plain text
    pub fn resolve_style(&self, name: &str) -> Style {
        self.item_datas
            .get(name)
            .map(ItemData::resolve)
            .unwrap_or_else(|| DefaultStyle::Normal.base_style())
    }

    /// Keyword matching is case sensitive unless a list says otherwise
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Characters separating words; whitespace always counts
    pub fn is_delimiter(&self, c: char) -> bool {
        c.is_whitespace() || self.delimiters.contains(&c)
    }
}
