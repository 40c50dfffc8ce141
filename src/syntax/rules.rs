//! Matching rules
//!
//! A rule is one lexical matcher plus what happens when it matches: the
//! style it paints, the context transition it requests, the fold regions it
//! opens or closes and the child rules tried right after it.

use std::sync::Arc;

use log::warn;
use regex::{Regex, RegexBuilder};

use super::grammar::{Grammar, KeywordListId, Transition};
use super::progress::ProgressData;
use super::style::StyleName;

/// A character operand, either literal or taken from a regex capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharPattern {
    Literal(char),
    /// First character of capture `n`, known only once instantiated
    Capture(usize),
}

impl CharPattern {
    /// Parse `%N` as a capture reference when `dynamic`, else the first char
    pub fn parse(text: &str, dynamic: bool) -> Option<Self> {
        if dynamic {
            if let Some(index) = placeholder_index(text) {
                return Some(CharPattern::Capture(index));
            }
        }
        text.chars().next().map(CharPattern::Literal)
    }

    fn literal(&self) -> Option<char> {
        match self {
            CharPattern::Literal(c) => Some(*c),
            CharPattern::Capture(_) => None,
        }
    }

    fn instantiate(&self, captures: &[String]) -> Self {
        match self {
            CharPattern::Capture(index) => captures
                .get(*index)
                .and_then(|capture| capture.chars().next())
                .map(CharPattern::Literal)
                .unwrap_or(*self),
            literal => *literal,
        }
    }
}

/// A regular expression rule, compiled eagerly unless it has placeholders
#[derive(Debug, Clone)]
pub struct RegexRule {
    pattern: String,
    insensitive: bool,
    minimal: bool,
    dynamic: bool,
    compiled: Option<Arc<Regex>>,
}

impl RegexRule {
    pub fn new(
        pattern: &str,
        insensitive: bool,
        minimal: bool,
        dynamic: bool,
    ) -> Result<Self, regex::Error> {
        let compiled = if dynamic {
            None
        } else {
            Some(Arc::new(Self::compile(pattern, insensitive, minimal)?))
        };
        Ok(Self {
            pattern: pattern.to_string(),
            insensitive,
            minimal,
            dynamic,
            compiled,
        })
    }

    fn compile(pattern: &str, insensitive: bool, minimal: bool) -> Result<Regex, regex::Error> {
        let source = if minimal {
            format!("(?U){}", pattern)
        } else {
            pattern.to_string()
        };
        RegexBuilder::new(&source)
            .case_insensitive(insensitive)
            .build()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn instantiate(&self, captures: &[String], failures: &mut usize) -> Self {
        if !self.dynamic {
            return self.clone();
        }
        let pattern = substitute(&self.pattern, captures, true);
        let compiled = match Self::compile(&pattern, self.insensitive, self.minimal) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(err) => {
                warn!("dynamic regex `{}` failed to compile: {}", pattern, err);
                *failures += 1;
                None
            }
        };
        Self {
            pattern,
            insensitive: self.insensitive,
            minimal: self.minimal,
            dynamic: false,
            compiled,
        }
    }

    /// Match anchored at the cursor, recording captures on success
    fn matches(&self, text: &str, progress: &mut ProgressData) -> bool {
        let Some(regex) = &self.compiled else {
            return false;
        };
        let offset = progress.offset();
        let key = Arc::as_ptr(regex) as usize;
        if let Some(probe) = progress.regex_probe(key) {
            if probe.answers(offset) == Some(false) {
                return false;
            }
        }

        let Some(caps) = regex.captures_at(text, offset) else {
            progress.store_regex_probe(regex, offset, None);
            return false;
        };
        let Some(whole) = caps.get(0) else {
            return false;
        };
        progress.store_regex_probe(regex, offset, Some(whole.start()));
        if whole.start() != offset {
            return false;
        }

        let captures = caps
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        progress.set_captures(captures);
        progress.set_offset(whole.end());
        true
    }
}

/// The closed set of matchers
#[derive(Debug, Clone)]
pub enum RuleKind {
    DetectChar(CharPattern),
    Detect2Chars(CharPattern, CharPattern),
    AnyChar(Vec<char>),
    StringDetect {
        text: String,
        insensitive: bool,
        dynamic: bool,
    },
    WordDetect {
        text: String,
        insensitive: bool,
    },
    RegExpr(RegexRule),
    Keyword(KeywordListId),
    Int,
    Float,
    HlCOct,
    HlCHex,
    HlCStringChar,
    HlCChar,
    RangeDetect(char, char),
    LineContinue(char),
    DetectSpaces,
    DetectIdentifier,
}

impl RuleKind {
    fn is_dynamic(&self) -> bool {
        match self {
            RuleKind::DetectChar(c) => c.literal().is_none(),
            RuleKind::Detect2Chars(a, b) => a.literal().is_none() || b.literal().is_none(),
            RuleKind::StringDetect { dynamic, .. } => *dynamic,
            RuleKind::RegExpr(regex) => regex.dynamic,
            _ => false,
        }
    }

    fn instantiate(&self, captures: &[String], failures: &mut usize) -> Self {
        match self {
            RuleKind::DetectChar(c) => RuleKind::DetectChar(c.instantiate(captures)),
            RuleKind::Detect2Chars(a, b) => {
                RuleKind::Detect2Chars(a.instantiate(captures), b.instantiate(captures))
            }
            RuleKind::StringDetect {
                text,
                insensitive,
                dynamic: true,
            } => RuleKind::StringDetect {
                text: substitute(text, captures, false),
                insensitive: *insensitive,
                dynamic: false,
            },
            RuleKind::RegExpr(regex) => RuleKind::RegExpr(regex.instantiate(captures, failures)),
            other => other.clone(),
        }
    }

    /// Kind-specific matching; may leave the cursor anywhere on failure
    fn matches(&self, text: &str, progress: &mut ProgressData, grammar: &Grammar) -> bool {
        let offset = progress.offset();
        let rest = &text[offset..];
        match self {
            RuleKind::DetectChar(pattern) => match (pattern.literal(), rest.chars().next()) {
                (Some(expected), Some(found)) if expected == found => {
                    progress.advance(found.len_utf8());
                    true
                }
                _ => false,
            },
            RuleKind::Detect2Chars(first, second) => {
                let (Some(first), Some(second)) = (first.literal(), second.literal()) else {
                    return false;
                };
                let mut chars = rest.chars();
                if chars.next() == Some(first) && chars.next() == Some(second) {
                    progress.advance(first.len_utf8() + second.len_utf8());
                    true
                } else {
                    false
                }
            }
            RuleKind::AnyChar(set) => match rest.chars().next() {
                Some(c) if set.contains(&c) => {
                    progress.advance(c.len_utf8());
                    true
                }
                _ => false,
            },
            RuleKind::StringDetect {
                text: needle,
                insensitive,
                ..
            } => match match_str(rest, needle, *insensitive) {
                Some(len) => {
                    progress.advance(len);
                    true
                }
                None => false,
            },
            RuleKind::WordDetect {
                text: needle,
                insensitive,
            } => {
                if !preceded_by_delimiter(text, offset, grammar) {
                    return false;
                }
                let Some(len) = match_str(rest, needle, *insensitive) else {
                    return false;
                };
                match rest[len..].chars().next() {
                    Some(next) if !grammar.is_delimiter(next) => false,
                    _ => {
                        progress.advance(len);
                        true
                    }
                }
            }
            RuleKind::RegExpr(regex) => regex.matches(text, progress),
            RuleKind::Keyword(list) => {
                let Some(list) = grammar.keyword_list(*list) else {
                    return false;
                };
                if !preceded_by_delimiter(text, offset, grammar) {
                    return false;
                }
                let len = rest.find(|c| grammar.is_delimiter(c)).unwrap_or(rest.len());
                if len == 0 || !list.contains(&rest[..len], grammar.is_case_sensitive()) {
                    return false;
                }
                progress.advance(len);
                true
            }
            RuleKind::Int => {
                if !preceded_by_delimiter(text, offset, grammar) {
                    return false;
                }
                let digits = count_while(rest, |b| b.is_ascii_digit());
                if digits == 0 {
                    return false;
                }
                progress.advance(digits);
                true
            }
            RuleKind::Float => {
                if !preceded_by_delimiter(text, offset, grammar) {
                    return false;
                }
                match float_len(rest) {
                    Some(len) => {
                        progress.advance(len);
                        true
                    }
                    None => false,
                }
            }
            RuleKind::HlCOct => {
                if !preceded_by_delimiter(text, offset, grammar) || !rest.starts_with('0') {
                    return false;
                }
                let digits = count_while(&rest[1..], |b| (b'0'..=b'7').contains(&b));
                if digits == 0 {
                    return false;
                }
                let end = 1 + digits;
                progress.advance(end + integer_suffix_len(&rest[end..]));
                true
            }
            RuleKind::HlCHex => {
                if !preceded_by_delimiter(text, offset, grammar)
                    || !(rest.starts_with("0x") || rest.starts_with("0X"))
                {
                    return false;
                }
                let digits = count_while(&rest[2..], |b| b.is_ascii_hexdigit());
                if digits == 0 {
                    return false;
                }
                let end = 2 + digits;
                progress.advance(end + integer_suffix_len(&rest[end..]));
                true
            }
            RuleKind::HlCStringChar => match_string_char(text, progress),
            RuleKind::HlCChar => {
                if !rest.starts_with('\'') {
                    return false;
                }
                progress.advance(1);
                if !match_string_char(text, progress) {
                    match text[progress.offset()..].chars().next() {
                        Some(c) if c != '\'' && c != '\\' => progress.advance(c.len_utf8()),
                        _ => return false,
                    }
                }
                if text[progress.offset()..].starts_with('\'') {
                    progress.advance(1);
                    true
                } else {
                    false
                }
            }
            RuleKind::RangeDetect(open, close) => {
                let mut chars = rest.chars();
                if chars.next() != Some(*open) {
                    return false;
                }
                let body = &rest[open.len_utf8()..];
                match body.find(*close) {
                    Some(at) => {
                        progress.advance(open.len_utf8() + at + close.len_utf8());
                        true
                    }
                    None => false,
                }
            }
            RuleKind::LineContinue(marker) => {
                let mut chars = rest.chars();
                if chars.next() == Some(*marker) && chars.next().is_none() {
                    progress.advance(marker.len_utf8());
                    progress.mark_will_continue();
                    true
                } else {
                    false
                }
            }
            RuleKind::DetectSpaces => {
                let len: usize = rest
                    .chars()
                    .take_while(|c| c.is_whitespace())
                    .map(char::len_utf8)
                    .sum();
                progress.advance(len);
                len > 0
            }
            RuleKind::DetectIdentifier => {
                let len: usize = rest
                    .chars()
                    .take_while(|&c| !grammar.is_delimiter(c))
                    .map(char::len_utf8)
                    .sum();
                progress.advance(len);
                len > 0
            }
        }
    }
}

/// A matcher with its styling, transition and fold bookkeeping
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) kind: RuleKind,
    /// Item data name; `None` paints with the owning context's style
    pub(crate) style: Option<StyleName>,
    pub(crate) transition: Transition,
    pub(crate) look_ahead: bool,
    pub(crate) first_non_space: bool,
    pub(crate) column: Option<usize>,
    pub(crate) begin_region: Option<StyleName>,
    pub(crate) end_region: Option<StyleName>,
    pub(crate) children: Vec<Rule>,
}

impl Rule {
    /// A rule with no style, transition or constraints
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            style: None,
            transition: Transition::Stay,
            look_ahead: false,
            first_non_space: false,
            column: None,
            begin_region: None,
            end_region: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    pub fn style(&self) -> Option<&StyleName> {
        self.style.as_ref()
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn is_look_ahead(&self) -> bool {
        self.look_ahead
    }

    pub fn children(&self) -> &[Rule] {
        &self.children
    }

    /// True if this rule or any child needs captures before it can match
    pub fn is_dynamic(&self) -> bool {
        self.kind.is_dynamic() || self.children.iter().any(Rule::is_dynamic)
    }

    /// Fill capture placeholders in this rule and its children
    pub fn instantiate(&self, captures: &[String], failures: &mut usize) -> Rule {
        Rule {
            kind: self.kind.instantiate(captures, failures),
            children: self
                .children
                .iter()
                .map(|child| child.instantiate(captures, failures))
                .collect(),
            ..self.clone()
        }
    }

    /// Try this rule at the cursor
    ///
    /// On failure the cursor is left where it was. On success it sits past
    /// the consumed text, or where it was for look-ahead rules.
    pub fn try_match(&self, text: &str, progress: &mut ProgressData, grammar: &Grammar) -> bool {
        let start = progress.offset();
        if start >= text.len() {
            return false;
        }
        if self.first_non_space && !progress.is_only_spaces_so_far() {
            return false;
        }
        if let Some(column) = self.column {
            if text[..start].chars().count() != column {
                return false;
            }
        }

        let only_spaces = progress.is_only_spaces_so_far();
        if !self.kind.matches(text, progress, grammar) {
            progress.set_offset(start);
            return false;
        }
        let end = progress.offset();

        if self.begin_region.is_some() && only_spaces {
            progress.mark_opening_at_first_non_space();
        }
        if self.end_region.is_some() && end < text.len() {
            progress.mark_closing_at_non_end();
        }
        if self.look_ahead {
            progress.set_offset(start);
        } else if only_spaces && text[start..end].chars().any(|c| !c.is_whitespace()) {
            progress.clear_only_spaces();
        }
        true
    }
}

/// Index of a leading `%N` placeholder
fn placeholder_index(text: &str) -> Option<usize> {
    let digit = text.strip_prefix('%')?.chars().next()?;
    digit.to_digit(10).map(|d| d as usize)
}

/// Whether `text` contains a `%N` capture placeholder
pub fn has_placeholder(text: &str) -> bool {
    text.match_indices('%')
        .any(|(at, _)| placeholder_index(&text[at..]).is_some())
}

/// Replace `%N` placeholders with capture text
fn substitute(text: &str, captures: &[String], escape: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(index) = chars.peek().and_then(|d| d.to_digit(10)) {
                chars.next();
                let capture = captures.get(index as usize).map(String::as_str).unwrap_or("");
                if escape {
                    out.push_str(&regex::escape(capture));
                } else {
                    out.push_str(capture);
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Length in `haystack` bytes of a prefix equal to `needle`
fn match_str(haystack: &str, needle: &str, insensitive: bool) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    if !insensitive {
        return haystack.starts_with(needle).then_some(needle.len());
    }
    let mut len = 0;
    let mut found = haystack.chars();
    for expected in needle.chars() {
        let c = found.next()?;
        if c != expected && !c.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        len += c.len_utf8();
    }
    Some(len)
}

fn preceded_by_delimiter(text: &str, offset: usize, grammar: &Grammar) -> bool {
    match text[..offset].chars().next_back() {
        Some(prev) => grammar.is_delimiter(prev),
        None => true,
    }
}

fn count_while(text: &str, pred: impl Fn(u8) -> bool) -> usize {
    text.bytes().take_while(|&b| pred(b)).count()
}

fn integer_suffix_len(text: &str) -> usize {
    count_while(text, |b| matches!(b, b'u' | b'U' | b'l' | b'L'))
}

/// `1.`, `.5`, `1.5`, `1e9`, `1.5e-3` with an optional `f`/`l` suffix
fn float_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let integral = count_while(text, |b| b.is_ascii_digit());
    let mut at = integral;
    let mut point = false;
    let mut fractional = 0;
    if bytes.get(at) == Some(&b'.') {
        point = true;
        at += 1;
        fractional = count_while(&text[at..], |b| b.is_ascii_digit());
        at += fractional;
    }
    if integral == 0 && fractional == 0 {
        return None;
    }

    let mut exponent = false;
    if matches!(bytes.get(at), Some(b'e') | Some(b'E')) {
        let mut probe = at + 1;
        if matches!(bytes.get(probe), Some(b'+') | Some(b'-')) {
            probe += 1;
        }
        let digits = count_while(&text[probe..], |b| b.is_ascii_digit());
        if digits > 0 {
            exponent = true;
            at = probe + digits;
        }
    }
    if !point && !exponent {
        return None;
    }
    if matches!(bytes.get(at), Some(b'f') | Some(b'F') | Some(b'l') | Some(b'L')) {
        at += 1;
    }
    Some(at)
}

/// C escape sequence: `\n`, `\x1f`, `\017` and friends
fn match_string_char(text: &str, progress: &mut ProgressData) -> bool {
    progress.save_offset();
    let rest = &text[progress.offset()..];
    let bytes = rest.as_bytes();
    if bytes.first() != Some(&b'\\') {
        progress.restore_offset();
        return false;
    }
    let len = match bytes.get(1) {
        Some(b'a' | b'b' | b'e' | b'f' | b'n' | b'r' | b't' | b'v' | b'"' | b'\'' | b'?' | b'\\') => 2,
        Some(b'x') => {
            let digits = count_while(&rest[2..], |b| b.is_ascii_hexdigit());
            if digits == 0 {
                progress.restore_offset();
                return false;
            }
            2 + digits
        }
        Some(b'0'..=b'7') => 1 + count_while(&rest[1..], |b| (b'0'..=b'7').contains(&b)).min(3),
        _ => {
            progress.restore_offset();
            return false;
        }
    };
    progress.advance(len);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::definition::{GrammarDef, RuleDef};

    fn grammar() -> Grammar {
        GrammarDef::new("Test")
            .keywords("types", &["int", "long"])
            .context(crate::syntax::definition::ContextDef::new("Normal", "Normal"))
            .resolve()
            .unwrap()
    }

    fn run(kind: RuleKind, text: &str, at: usize) -> Option<usize> {
        let grammar = grammar();
        let rule = Rule::new(kind);
        let mut progress = ProgressData::new();
        progress.set_offset(at);
        if rule.try_match(text, &mut progress, &grammar) {
            Some(progress.offset() - at)
        } else {
            assert_eq!(progress.offset(), at, "failed match must not move the cursor");
            None
        }
    }

    #[test]
    fn test_detect_chars() {
        assert_eq!(run(RuleKind::DetectChar(CharPattern::Literal('"')), "\"x", 0), Some(1));
        assert_eq!(run(RuleKind::DetectChar(CharPattern::Literal('"')), "x\"", 0), None);
        let slashes = RuleKind::Detect2Chars(CharPattern::Literal('/'), CharPattern::Literal('/'));
        assert_eq!(run(slashes.clone(), "a // b", 2), Some(2));
        assert_eq!(run(slashes, "/*", 0), None);
        assert_eq!(run(RuleKind::AnyChar(vec!['+', '-']), "-1", 0), Some(1));
    }

    #[test]
    fn test_string_and_word_detect() {
        let kind = RuleKind::StringDetect {
            text: "BEGIN".to_string(),
            insensitive: true,
            dynamic: false,
        };
        assert_eq!(run(kind, "begin end", 0), Some(5));

        let word = RuleKind::WordDetect {
            text: "if".to_string(),
            insensitive: false,
        };
        assert_eq!(run(word.clone(), "if (x)", 0), Some(2));
        assert_eq!(run(word.clone(), "iffy", 0), None);
        assert_eq!(run(word, "xif", 1), None);
    }

    #[test]
    fn test_keyword_needs_whole_word() {
        let grammar = grammar();
        let id = grammar.keyword_ids["types"];
        assert_eq!(run(RuleKind::Keyword(id), "int i", 0), Some(3));
        assert_eq!(run(RuleKind::Keyword(id), "integer", 0), None);
        assert_eq!(run(RuleKind::Keyword(id), "x_int", 2), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(run(RuleKind::Int, "x = 42;", 4), Some(2));
        assert_eq!(run(RuleKind::Int, "0", 0), Some(1));
        assert_eq!(run(RuleKind::Int, "a1", 1), None);
        assert_eq!(run(RuleKind::Float, "1.5e-3f", 0), Some(7));
        assert_eq!(run(RuleKind::Float, ".5", 0), Some(2));
        assert_eq!(run(RuleKind::Float, "1e9", 0), Some(3));
        assert_eq!(run(RuleKind::Float, "12", 0), None);
        assert_eq!(run(RuleKind::HlCOct, "0755", 0), Some(4));
        assert_eq!(run(RuleKind::HlCOct, "09", 0), None);
        assert_eq!(run(RuleKind::HlCHex, "0xFFul", 0), Some(6));
        assert_eq!(run(RuleKind::HlCHex, "0x", 0), None);
    }

    #[test]
    fn test_escapes_and_chars() {
        assert_eq!(run(RuleKind::HlCStringChar, "\\n", 0), Some(2));
        assert_eq!(run(RuleKind::HlCStringChar, "\\x1fz", 0), Some(4));
        assert_eq!(run(RuleKind::HlCStringChar, "\\0177", 0), Some(4));
        assert_eq!(run(RuleKind::HlCStringChar, "\\q", 0), None);
        assert_eq!(run(RuleKind::HlCChar, "'a'", 0), Some(3));
        assert_eq!(run(RuleKind::HlCChar, "'\\n'", 0), Some(4));
        assert_eq!(run(RuleKind::HlCChar, "'ab'", 0), None);
    }

    #[test]
    fn test_range_continue_spaces_identifier() {
        assert_eq!(run(RuleKind::RangeDetect('<', '>'), "<stdio.h> x", 0), Some(9));
        assert_eq!(run(RuleKind::RangeDetect('<', '>'), "<stdio.h", 0), None);
        assert_eq!(run(RuleKind::LineContinue('\\'), "x \\", 2), Some(1));
        assert_eq!(run(RuleKind::LineContinue('\\'), "\\ x", 0), None);
        assert_eq!(run(RuleKind::DetectSpaces, " \t x", 0), Some(3));
        assert_eq!(run(RuleKind::DetectSpaces, "x", 0), None);
        assert_eq!(run(RuleKind::DetectIdentifier, "foo_1(bar)", 0), Some(5));
    }

    #[test]
    fn test_regex_is_anchored_and_records_captures() {
        let grammar = grammar();
        let regex = RegexRule::new("---(abc)(def)", false, false, false).unwrap();
        let rule = Rule::new(RuleKind::RegExpr(regex));
        let mut progress = ProgressData::new();
        assert!(rule.try_match("---abcdef", &mut progress, &grammar));
        assert_eq!(progress.offset(), 9);
        assert_eq!(progress.captures(), ["---abcdef", "abc", "def"]);

        let mut progress = ProgressData::new();
        assert!(!rule.try_match("x---abcdef", &mut progress, &grammar));
        assert_eq!(progress.pending_notifications(), 1);
        progress.finish();
        assert_eq!(progress.pending_notifications(), 0);
    }

    #[test]
    fn test_minimal_regex() {
        let grammar = grammar();
        let greedy = Rule::new(RuleKind::RegExpr(RegexRule::new("<.+>", false, false, false).unwrap()));
        let minimal = Rule::new(RuleKind::RegExpr(RegexRule::new("<.+>", false, true, false).unwrap()));
        let mut progress = ProgressData::new();
        assert!(greedy.try_match("<a><b>", &mut progress, &grammar));
        assert_eq!(progress.offset(), 6);
        let mut progress = ProgressData::new();
        assert!(minimal.try_match("<a><b>", &mut progress, &grammar));
        assert_eq!(progress.offset(), 3);
    }

    #[test]
    fn test_constraints_reject_without_moving() {
        let grammar = grammar();
        let mut rule = Rule::new(RuleKind::DetectChar(CharPattern::Literal('#')));
        rule.first_non_space = true;
        let mut progress = ProgressData::new();
        progress.set_offset(2);
        assert!(rule.try_match("  #if", &mut progress, &grammar));

        let mut progress = ProgressData::new();
        progress.clear_only_spaces();
        progress.set_offset(2);
        assert!(!rule.try_match("x #if", &mut progress, &grammar));
        assert_eq!(progress.offset(), 2);

        let mut rule = Rule::new(RuleKind::DetectChar(CharPattern::Literal('a')));
        rule.column = Some(0);
        let mut progress = ProgressData::new();
        progress.set_offset(1);
        assert!(!rule.try_match("aa", &mut progress, &grammar));
        assert_eq!(progress.offset(), 1);
    }

    #[test]
    fn test_look_ahead_restores_offset() {
        let grammar = grammar();
        let mut rule = Rule::new(RuleKind::DetectChar(CharPattern::Literal('x')));
        rule.look_ahead = true;
        let mut progress = ProgressData::new();
        assert!(rule.try_match("xyz", &mut progress, &grammar));
        assert_eq!(progress.offset(), 0);
        assert!(progress.is_only_spaces_so_far());
    }

    #[test]
    fn test_dynamic_instantiation() {
        let captures = vec!["---abcdef".to_string(), "abc".to_string(), "def".to_string()];
        let rule = Rule::new(RuleKind::DetectChar(CharPattern::Capture(1)));
        assert!(rule.is_dynamic());
        let mut failures = 0;
        let concrete = rule.instantiate(&captures, &mut failures);
        assert!(!concrete.is_dynamic());
        assert!(matches!(concrete.kind, RuleKind::DetectChar(CharPattern::Literal('a'))));

        let regex = RegexRule::new("^%2$", false, false, true).unwrap();
        let rule = Rule::new(RuleKind::RegExpr(regex));
        let concrete = rule.instantiate(&["x".into(), "a.b".into(), "c+d".into()], &mut failures);
        let RuleKind::RegExpr(regex) = &concrete.kind else {
            panic!("expected a regex rule");
        };
        assert_eq!(regex.pattern(), r"^c\+d$");
        assert_eq!(failures, 0);
    }

    #[test]
    fn test_placeholders() {
        assert!(has_placeholder("%1"));
        assert!(has_placeholder("end%2here"));
        assert!(!has_placeholder("100%"));
        assert!(!has_placeholder("%x"));
        assert_eq!(substitute("<%1>", &["".into(), "tag".into()], false), "<tag>");
        assert_eq!(substitute("%9", &[], false), "");
        assert_eq!(CharPattern::parse("%1", true), Some(CharPattern::Capture(1)));
        assert_eq!(CharPattern::parse("%1", false), Some(CharPattern::Literal('%')));
    }
}
