//! Scan cursor shared by every rule attempt on one line

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

/// Where a regular expression was last found on the current line
///
/// Searching from `searched_from` found the leftmost match starting at
/// `next_start` (or nothing at all), so no match can start in between.
#[derive(Debug, Clone)]
pub(crate) struct RegexProbe {
    /// Keeps the regex alive so its address stays a unique cache key
    _regex: Arc<Regex>,
    searched_from: usize,
    next_start: Option<usize>,
}

/// Mutable matching state for one line scan
///
/// Offsets are byte offsets into the line being scanned.
#[derive(Debug, Clone)]
pub struct ProgressData {
    offset: usize,
    saved_offset: Option<usize>,
    only_spaces_so_far: bool,
    opening_at_first_non_space: bool,
    closing_at_non_end: bool,
    will_continue: bool,
    captures: Vec<String>,
    /// Regex rules that cached search results; dropped by `finish`
    regex_probes: HashMap<usize, RegexProbe>,
}

impl ProgressData {
    /// Create a cursor at the start of a line
    pub fn new() -> Self {
        Self {
            offset: 0,
            saved_offset: None,
            only_spaces_so_far: true,
            opening_at_first_non_space: false,
            closing_at_non_end: false,
            will_continue: false,
            captures: Vec::new(),
            regex_probes: HashMap::new(),
        }
    }

    /// Current byte offset
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move the cursor to an absolute offset
    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Advance by `n` bytes
    pub fn advance(&mut self, n: usize) {
        self.offset += n;
    }

    /// Advance past the character at the current offset
    pub fn advance_char(&mut self, text: &str) {
        match text.get(self.offset..).and_then(|rest| rest.chars().next()) {
            Some(c) => self.offset += c.len_utf8(),
            None => self.offset = text.len().max(self.offset),
        }
    }

    /// Remember the current offset for a later `restore_offset`
    pub fn save_offset(&mut self) {
        self.saved_offset = Some(self.offset);
    }

    /// Return to the last saved offset, if any
    pub fn restore_offset(&mut self) {
        if let Some(offset) = self.saved_offset.take() {
            self.offset = offset;
        }
    }

    /// Whether only whitespace has been consumed on this line so far
    pub fn is_only_spaces_so_far(&self) -> bool {
        self.only_spaces_so_far
    }

    /// Record that non-whitespace text has been consumed
    pub fn clear_only_spaces(&mut self) {
        self.only_spaces_so_far = false;
    }

    /// A fold region opened at the first non-space position
    pub fn is_opening_at_first_non_space(&self) -> bool {
        self.opening_at_first_non_space
    }

    pub fn mark_opening_at_first_non_space(&mut self) {
        self.opening_at_first_non_space = true;
    }

    /// A fold region closed somewhere other than the end of the line
    pub fn is_closing_at_non_end(&self) -> bool {
        self.closing_at_non_end
    }

    pub fn mark_closing_at_non_end(&mut self) {
        self.closing_at_non_end = true;
    }

    /// Reset fold-marker flags; called once per matched rule
    pub fn clear_fold_flags(&mut self) {
        self.opening_at_first_non_space = false;
        self.closing_at_non_end = false;
    }

    /// The line ends in a continuation character
    pub fn is_will_continue(&self) -> bool {
        self.will_continue
    }

    pub fn mark_will_continue(&mut self) {
        self.will_continue = true;
    }

    /// Consume the continuation flag
    pub fn take_will_continue(&mut self) -> bool {
        std::mem::take(&mut self.will_continue)
    }

    /// Capture groups of the most recent regex match (group 0 included)
    pub fn captures(&self) -> &[String] {
        &self.captures
    }

    pub fn set_captures(&mut self, captures: Vec<String>) {
        self.captures = captures;
    }

    pub(crate) fn regex_probe(&self, key: usize) -> Option<&RegexProbe> {
        self.regex_probes.get(&key)
    }

    pub(crate) fn store_regex_probe(
        &mut self,
        regex: &Arc<Regex>,
        searched_from: usize,
        next_start: Option<usize>,
    ) {
        self.regex_probes.insert(
            Arc::as_ptr(regex) as usize,
            RegexProbe {
                _regex: Arc::clone(regex),
                searched_from,
                next_start,
            },
        );
    }

    /// Number of rules holding per-scan cached state
    pub fn pending_notifications(&self) -> usize {
        self.regex_probes.len()
    }

    /// End of scan: release every per-scan cache
    pub fn finish(&mut self) {
        self.regex_probes.clear();
    }
}

impl RegexProbe {
    /// Decide from the cache whether a match can start at `offset`
    ///
    /// `Some(false)`: certainly no match. `Some(true)`: the cached match
    /// starts exactly here. `None`: the cache cannot tell.
    pub(crate) fn answers(&self, offset: usize) -> Option<bool> {
        if offset < self.searched_from {
            return None;
        }
        match self.next_start {
            None => Some(false),
            Some(start) if offset < start => Some(false),
            Some(start) if offset == start => Some(true),
            Some(_) => None,
        }
    }
}

impl Default for ProgressData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_and_restore() {
        let mut progress = ProgressData::new();
        progress.advance(3);
        progress.save_offset();
        progress.advance(2);
        assert_eq!(progress.offset(), 5);
        progress.restore_offset();
        assert_eq!(progress.offset(), 3);
        // Single level: a second restore is a no-op
        progress.advance(1);
        progress.restore_offset();
        assert_eq!(progress.offset(), 4);
    }

    #[test]
    fn test_advance_char_multibyte() {
        let mut progress = ProgressData::new();
        let text = "é!";
        progress.advance_char(text);
        assert_eq!(progress.offset(), 2);
        progress.advance_char(text);
        assert_eq!(progress.offset(), 3);
        progress.advance_char(text);
        assert_eq!(progress.offset(), 3);
    }

    #[test]
    fn test_fold_flags() {
        let mut progress = ProgressData::new();
        progress.mark_opening_at_first_non_space();
        progress.mark_closing_at_non_end();
        assert!(progress.is_opening_at_first_non_space());
        assert!(progress.is_closing_at_non_end());
        progress.clear_fold_flags();
        assert!(!progress.is_opening_at_first_non_space());
        assert!(!progress.is_closing_at_non_end());
    }

    #[test]
    fn test_will_continue_is_consumed() {
        let mut progress = ProgressData::new();
        assert!(!progress.is_will_continue());
        progress.mark_will_continue();
        assert!(progress.take_will_continue());
        assert!(!progress.is_will_continue());
    }

    #[test]
    fn test_finish_releases_probes() {
        let mut progress = ProgressData::new();
        let regex = Arc::new(Regex::new("a").unwrap());
        progress.store_regex_probe(&regex, 0, Some(4));
        assert_eq!(progress.pending_notifications(), 1);

        let probe = progress.regex_probe(Arc::as_ptr(&regex) as usize).unwrap();
        assert_eq!(probe.answers(2), Some(false));
        assert_eq!(probe.answers(4), Some(true));
        assert_eq!(probe.answers(5), None);

        progress.finish();
        assert_eq!(progress.pending_notifications(), 0);
    }
}
