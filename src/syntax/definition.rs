//! Grammar definitions
//!
//! Definitions are the unresolved, serializable form of a grammar. They can
//! be written in TOML or assembled in code, and `Grammar::from_def` turns
//! them into a `Grammar`: names are resolved to ids, static regexes are
//! compiled, `include_rules` are expanded and every reference is checked.
//!
//! ```toml
//! name = "Mini"
//! extensions = ["mini"]
//!
//! [[item_datas]]
//! name = "Comment"
//! style = "Comment"
//!
//! [[contexts]]
//! name = "Normal"
//! style = "Normal"
//! rules = [
//!   { kind = "detect_2chars", char = "/", char1 = "/", context = "Comment" },
//!   { kind = "int", style = "DecVal" },
//! ]
//!
//! [[contexts]]
//! name = "Comment"
//! style = "Comment"
//! line_end = "#pop"
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::error::{HighlightError, Result};

use super::default_style::DefaultStyle;
use super::grammar::{
    Context, ContextId, Grammar, ItemData, KeywordList, KeywordListId, Transition,
    DEFAULT_DELIMITERS,
};
use super::rules::{has_placeholder, CharPattern, RegexRule, Rule, RuleKind};
use super::style::{Color, StyleName};

/// A whole language definition
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrammarDef {
    pub name: String,
    pub extensions: Vec<String>,
    /// Defaults to the first context
    pub initial_context: Option<String>,
    pub case_sensitive: bool,
    pub additional_delimiters: String,
    pub weak_delimiters: String,
    pub item_datas: Vec<ItemDataDef>,
    pub keyword_lists: Vec<KeywordListDef>,
    pub contexts: Vec<ContextDef>,
}

impl Default for GrammarDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            extensions: Vec::new(),
            initial_context: None,
            case_sensitive: true,
            additional_delimiters: String::new(),
            weak_delimiters: String::new(),
            item_datas: Vec::new(),
            keyword_lists: Vec::new(),
            contexts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemDataDef {
    pub name: String,
    /// Name of the default style this item inherits from
    pub style: String,
    pub color: Option<String>,
    pub background: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike_out: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordListDef {
    pub name: String,
    pub words: Vec<String>,
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContextDef {
    pub name: String,
    /// Item data for text no rule claims
    pub style: String,
    pub line_begin: Option<String>,
    pub line_end: Option<String>,
    pub line_empty: Option<String>,
    pub fallthrough: Option<String>,
    pub rules: Vec<RuleDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleDef {
    /// `detect_char`, `DetectChar`, `reg_expr`, ... case and `_` are ignored
    pub kind: String,
    #[serde(rename = "char")]
    pub character: Option<String>,
    #[serde(rename = "char1")]
    pub character1: Option<String>,
    pub string: Option<String>,
    pub list: Option<String>,
    pub insensitive: bool,
    pub minimal: bool,
    /// Force or suppress placeholder handling; detected when unset
    pub dynamic: Option<bool>,
    pub style: Option<String>,
    pub context: Option<String>,
    pub look_ahead: bool,
    pub first_non_space: bool,
    pub column: Option<usize>,
    pub begin_region: Option<String>,
    pub end_region: Option<String>,
    pub children: Vec<RuleDef>,
}

impl GrammarDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Parse a TOML definition
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML definition file
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    pub fn extension(mut self, ext: &str) -> Self {
        self.extensions.push(ext.to_string());
        self
    }

    pub fn initial_context(mut self, name: &str) -> Self {
        self.initial_context = Some(name.to_string());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn additional_delimiters(mut self, chars: &str) -> Self {
        self.additional_delimiters.push_str(chars);
        self
    }

    pub fn weak_delimiters(mut self, chars: &str) -> Self {
        self.weak_delimiters.push_str(chars);
        self
    }

    /// Add an item data with no overrides
    pub fn item(self, name: &str, style: DefaultStyle) -> Self {
        self.item_data(ItemDataDef {
            name: name.to_string(),
            style: style.name().to_string(),
            ..Default::default()
        })
    }

    pub fn item_data(mut self, item: ItemDataDef) -> Self {
        self.item_datas.push(item);
        self
    }

    pub fn keywords(mut self, name: &str, words: &[&str]) -> Self {
        self.keyword_lists.push(KeywordListDef {
            name: name.to_string(),
            words: words.iter().map(|w| w.to_string()).collect(),
            case_sensitive: None,
        });
        self
    }

    pub fn context(mut self, context: ContextDef) -> Self {
        self.contexts.push(context);
        self
    }

    /// Shorthand for `Grammar::from_def`
    pub fn resolve(&self) -> Result<Grammar> {
        Grammar::from_def(self)
    }
}

impl ContextDef {
    pub fn new(name: &str, style: &str) -> Self {
        Self {
            name: name.to_string(),
            style: style.to_string(),
            ..Default::default()
        }
    }

    pub fn line_begin(mut self, transition: &str) -> Self {
        self.line_begin = Some(transition.to_string());
        self
    }

    pub fn line_end(mut self, transition: &str) -> Self {
        self.line_end = Some(transition.to_string());
        self
    }

    pub fn line_empty(mut self, transition: &str) -> Self {
        self.line_empty = Some(transition.to_string());
        self
    }

    pub fn fallthrough(mut self, transition: &str) -> Self {
        self.fallthrough = Some(transition.to_string());
        self
    }

    pub fn rule(mut self, rule: RuleDef) -> Self {
        self.rules.push(rule);
        self
    }
}

impl RuleDef {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn detect_char(c: &str) -> Self {
        Self {
            character: Some(c.to_string()),
            ..Self::new("detect_char")
        }
    }

    pub fn detect_2chars(first: &str, second: &str) -> Self {
        Self {
            character: Some(first.to_string()),
            character1: Some(second.to_string()),
            ..Self::new("detect_2chars")
        }
    }

    pub fn any_char(set: &str) -> Self {
        Self::with_string("any_char", set)
    }

    pub fn string_detect(text: &str) -> Self {
        Self::with_string("string_detect", text)
    }

    pub fn word_detect(text: &str) -> Self {
        Self::with_string("word_detect", text)
    }

    pub fn reg_expr(pattern: &str) -> Self {
        Self::with_string("reg_expr", pattern)
    }

    pub fn keyword(list: &str) -> Self {
        Self {
            list: Some(list.to_string()),
            ..Self::new("keyword")
        }
    }

    pub fn range_detect(open: &str, close: &str) -> Self {
        Self {
            character: Some(open.to_string()),
            character1: Some(close.to_string()),
            ..Self::new("range_detect")
        }
    }

    pub fn include_rules(context: &str) -> Self {
        Self {
            context: Some(context.to_string()),
            ..Self::new("include_rules")
        }
    }

    fn with_string(kind: &str, text: &str) -> Self {
        Self {
            string: Some(text.to_string()),
            ..Self::new(kind)
        }
    }

    pub fn style(mut self, style: &str) -> Self {
        self.style = Some(style.to_string());
        self
    }

    pub fn context(mut self, transition: &str) -> Self {
        self.context = Some(transition.to_string());
        self
    }

    pub fn look_ahead(mut self) -> Self {
        self.look_ahead = true;
        self
    }

    pub fn first_non_space(mut self) -> Self {
        self.first_non_space = true;
        self
    }

    pub fn column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn insensitive(mut self) -> Self {
        self.insensitive = true;
        self
    }

    pub fn minimal(mut self) -> Self {
        self.minimal = true;
        self
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn begin_region(mut self, region: &str) -> Self {
        self.begin_region = Some(region.to_string());
        self
    }

    pub fn end_region(mut self, region: &str) -> Self {
        self.end_region = Some(region.to_string());
        self
    }

    pub fn child(mut self, child: RuleDef) -> Self {
        self.children.push(child);
        self
    }
}

/// Resolution state for one `Grammar::from_def` call
struct Resolver<'d> {
    def: &'d GrammarDef,
    context_ids: HashMap<String, ContextId>,
    context_defs: HashMap<&'d str, &'d ContextDef>,
    keyword_ids: HashMap<String, KeywordListId>,
    item_datas: HashMap<String, ItemData>,
}

impl<'d> Resolver<'d> {
    fn context_id(&self, name: &str) -> Result<ContextId> {
        self.context_ids
            .get(name)
            .copied()
            .ok_or_else(|| HighlightError::UnknownContext(name.to_string()))
    }

    fn transition(&self, target: Option<&str>) -> Result<Transition> {
        match target {
            Some(target) => Transition::parse(target, |name| self.context_id(name)),
            None => Ok(Transition::Stay),
        }
    }

    fn style(&self, name: &str) -> Result<StyleName> {
        self.item_datas
            .get(name)
            .map(|item| item.name.clone())
            .ok_or_else(|| HighlightError::UnknownItemData(name.to_string()))
    }

    /// Resolve a context's rule list, expanding `include_rules` in place
    fn rules(&self, owner: &str, defs: &[RuleDef], including: &mut Vec<String>) -> Result<Vec<Rule>> {
        let mut rules = Vec::with_capacity(defs.len());
        for def in defs {
            if normalize_kind(&def.kind) == "includerules" {
                let target = def
                    .context
                    .as_deref()
                    .ok_or_else(|| HighlightError::invalid_rule(owner, "include_rules needs a context"))?;
                if including.iter().any(|name| name == target) {
                    warn!("{}: recursive include of {} ignored", self.def.name, target);
                    continue;
                }
                let included = self
                    .context_defs
                    .get(target)
                    .ok_or_else(|| HighlightError::UnknownContext(target.to_string()))?;
                including.push(target.to_string());
                rules.extend(self.rules(owner, &included.rules, including)?);
                including.pop();
                continue;
            }
            rules.push(self.rule(owner, def)?);
        }
        Ok(rules)
    }

    fn rule(&self, owner: &str, def: &RuleDef) -> Result<Rule> {
        let kind = self.rule_kind(owner, def)?;
        let mut rule = Rule::new(kind);
        rule.style = def.style.as_deref().map(|s| self.style(s)).transpose()?;
        rule.transition = self.transition(def.context.as_deref())?;
        rule.look_ahead = def.look_ahead;
        rule.first_non_space = def.first_non_space;
        rule.column = def.column;
        rule.begin_region = def.begin_region.as_deref().map(StyleName::from);
        rule.end_region = def.end_region.as_deref().map(StyleName::from);
        rule.children = def
            .children
            .iter()
            .map(|child| self.rule(owner, child))
            .collect::<Result<_>>()?;
        Ok(rule)
    }

    fn rule_kind(&self, owner: &str, def: &RuleDef) -> Result<RuleKind> {
        let missing = |field: &str| {
            HighlightError::invalid_rule(owner, format!("{} rule needs `{}`", def.kind, field))
        };
        let char_field = |value: &Option<String>, field: &str| -> Result<CharPattern> {
            let text = value.as_deref().ok_or_else(|| missing(field))?;
            let dynamic = def.dynamic.unwrap_or_else(|| has_placeholder(text));
            CharPattern::parse(text, dynamic).ok_or_else(|| missing(field))
        };
        let literal_char = |value: &Option<String>, field: &str| -> Result<char> {
            value
                .as_deref()
                .and_then(|text| text.chars().next())
                .ok_or_else(|| missing(field))
        };
        let string = || def.string.as_deref().ok_or_else(|| missing("string"));

        let kind = match normalize_kind(&def.kind).as_str() {
            "detectchar" => RuleKind::DetectChar(char_field(&def.character, "char")?),
            "detect2chars" => RuleKind::Detect2Chars(
                char_field(&def.character, "char")?,
                char_field(&def.character1, "char1")?,
            ),
            "anychar" => RuleKind::AnyChar(string()?.chars().collect()),
            "stringdetect" => {
                let text = string()?;
                RuleKind::StringDetect {
                    text: text.to_string(),
                    insensitive: def.insensitive,
                    dynamic: def.dynamic.unwrap_or_else(|| has_placeholder(text)),
                }
            }
            "worddetect" => RuleKind::WordDetect {
                text: string()?.to_string(),
                insensitive: def.insensitive,
            },
            "regexpr" => {
                let pattern = string()?;
                let dynamic = def.dynamic.unwrap_or_else(|| has_placeholder(pattern));
                let regex = RegexRule::new(pattern, def.insensitive, def.minimal, dynamic)
                    .map_err(|source| HighlightError::InvalidRegex {
                        pattern: pattern.to_string(),
                        source,
                    })?;
                RuleKind::RegExpr(regex)
            }
            "keyword" => {
                let list = def.list.as_deref().ok_or_else(|| missing("list"))?;
                let id = self
                    .keyword_ids
                    .get(list)
                    .copied()
                    .ok_or_else(|| HighlightError::UnknownKeywordList(list.to_string()))?;
                RuleKind::Keyword(id)
            }
            "int" => RuleKind::Int,
            "float" => RuleKind::Float,
            "hlcoct" => RuleKind::HlCOct,
            "hlchex" => RuleKind::HlCHex,
            "hlcstringchar" => RuleKind::HlCStringChar,
            "hlcchar" => RuleKind::HlCChar,
            "rangedetect" => RuleKind::RangeDetect(
                literal_char(&def.character, "char")?,
                literal_char(&def.character1, "char1")?,
            ),
            "linecontinue" => {
                RuleKind::LineContinue(literal_char(&def.character, "char").unwrap_or('\\'))
            }
            "detectspaces" => RuleKind::DetectSpaces,
            "detectidentifier" => RuleKind::DetectIdentifier,
            _ => {
                return Err(HighlightError::invalid_rule(
                    owner,
                    format!("unknown rule kind `{}`", def.kind),
                ))
            }
        };
        Ok(kind)
    }
}

fn normalize_kind(kind: &str) -> String {
    kind.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn item_data(def: &ItemDataDef) -> ItemData {
    let default_style = DefaultStyle::from_name(&def.style).unwrap_or_else(|| {
        if !def.style.is_empty() {
            warn!("item data {}: unknown default style {}", def.name, def.style);
        }
        DefaultStyle::Normal
    });
    let color = |value: &Option<String>| {
        value.as_deref().and_then(|text| {
            let parsed = Color::parse(text);
            if parsed.is_none() {
                warn!("item data {}: unknown color {}", def.name, text);
            }
            parsed
        })
    };
    ItemData {
        color: color(&def.color),
        background: color(&def.background),
        bold: def.bold,
        italic: def.italic,
        underline: def.underline,
        strike_out: def.strike_out,
        ..ItemData::new(&def.name, default_style)
    }
}

impl Grammar {
    /// Resolve and validate a definition
    pub fn from_def(def: &GrammarDef) -> Result<Grammar> {
        let mut context_ids = HashMap::new();
        let mut context_defs = HashMap::new();
        let mut unique: Vec<&ContextDef> = Vec::new();
        for context in &def.contexts {
            if context_ids.contains_key(&context.name) {
                warn!("{}: duplicate context {} ignored", def.name, context.name);
                continue;
            }
            context_ids.insert(context.name.clone(), ContextId(unique.len()));
            context_defs.insert(context.name.as_str(), context);
            unique.push(context);
        }

        let initial = match &def.initial_context {
            Some(name) => *context_ids
                .get(name)
                .ok_or_else(|| HighlightError::UnknownContext(name.clone()))?,
            None if unique.is_empty() => {
                return Err(HighlightError::UnknownContext(format!(
                    "{}: grammar has no contexts",
                    def.name
                )))
            }
            None => ContextId(0),
        };

        let mut item_datas: HashMap<String, ItemData> = def
            .item_datas
            .iter()
            .map(|item| (item.name.clone(), item_data(item)))
            .collect();

        let mut keyword_ids = HashMap::new();
        let mut keyword_lists = Vec::new();
        for list in &def.keyword_lists {
            keyword_ids.insert(list.name.clone(), KeywordListId(keyword_lists.len()));
            keyword_lists.push(KeywordList::new(&list.name, list.words.iter().cloned(), list.case_sensitive));
        }

        // Names of default styles need no explicit item data
        let referenced = unique
            .iter()
            .map(|c| c.style.as_str())
            .chain(def.contexts.iter().flat_map(|c| rule_styles(&c.rules)));
        for name in referenced.collect::<Vec<_>>() {
            if item_datas.contains_key(name) {
                continue;
            }
            if let Some(style) = DefaultStyle::from_name(name) {
                item_datas.insert(name.to_string(), ItemData::new(name, style));
            }
        }

        let mut delimiters: HashSet<char> = DEFAULT_DELIMITERS.chars().collect();
        delimiters.extend(def.additional_delimiters.chars());
        for c in def.weak_delimiters.chars() {
            delimiters.remove(&c);
        }

        let resolver = Resolver {
            def,
            context_ids,
            context_defs,
            keyword_ids,
            item_datas,
        };

        let mut contexts = Vec::with_capacity(unique.len());
        for (index, context) in unique.iter().enumerate() {
            let style = resolver.style(&context.style)?;
            let mut including = vec![context.name.clone()];
            let rules = resolver.rules(&context.name, &context.rules, &mut including)?;
            let dynamic = rules.iter().any(Rule::is_dynamic);
            contexts.push(Context {
                id: ContextId(index),
                name: context.name.as_str().into(),
                style,
                rules,
                line_begin: resolver.transition(context.line_begin.as_deref())?,
                line_end: resolver.transition(context.line_end.as_deref())?,
                line_empty: context
                    .line_empty
                    .as_deref()
                    .map(|target| resolver.transition(Some(target)))
                    .transpose()?,
                fallthrough: context
                    .fallthrough
                    .as_deref()
                    .map(|target| resolver.transition(Some(target)))
                    .transpose()?,
                dynamic,
                captures: None,
            });
        }

        Ok(Grammar {
            name: def.name.clone(),
            extensions: def.extensions.clone(),
            contexts,
            context_ids: resolver.context_ids,
            keyword_lists,
            keyword_ids: resolver.keyword_ids,
            item_datas: resolver.item_datas,
            initial,
            case_sensitive: def.case_sensitive,
            delimiters,
        })
    }
}

/// Every style name used by a rule list, children included
fn rule_styles(rules: &[RuleDef]) -> Vec<&str> {
    let mut styles = Vec::new();
    for rule in rules {
        if let Some(style) = rule.style.as_deref() {
            styles.push(style);
        }
        styles.extend(rule_styles(&rule.children));
    }
    styles
}
