//! The highlighting engine
//!
//! `Highlighter` scans one line at a time. It rebuilds the context stack the
//! line starts in from the previous line's `LineData`, runs the rules of the
//! context on top of the stack across the line, and encodes the stack the
//! next line needs back into a small `LineData`.
//!
//! Context stacks that outlive a line are memoized: each distinct stack shape
//! gets a persistent id the first time it is seen, and the same shape always
//! maps back to the same id. Resuming from any line is then a table lookup
//! rather than a replay of the document.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::config::EngineConfig;
use crate::error::{HighlightError, Result};

use super::grammar::{Context, ContextId, Grammar, Transition};
use super::progress::ProgressData;
use super::rules::Rule;
use super::state::{FoldInfo, LineData, LineState, ObservableState, PERSISTENT_START};
use super::style::{Span, StyleName};

/// One level of the runtime context stack
#[derive(Debug, Clone)]
pub enum StackEntry {
    /// A context owned by the grammar
    Shared(ContextId),
    /// A dynamic context instantiated from regex captures
    Owned(Arc<Context>),
}

impl StackEntry {
    pub fn resolve<'a>(&'a self, grammar: &'a Grammar) -> Option<&'a Context> {
        match self {
            StackEntry::Shared(id) => grammar.context_by_id(*id),
            StackEntry::Owned(context) => Some(context),
        }
    }

    fn signature(&self, grammar: &Grammar) -> String {
        match self {
            StackEntry::Shared(id) => grammar
                .context_by_id(*id)
                .map(Context::signature)
                .unwrap_or_else(|| format!("#{}", id.index())),
            StackEntry::Owned(context) => context.signature(),
        }
    }
}

/// Memo table from context-stack signature to persistent id
///
/// Grows for the lifetime of the highlighter; ids are never reused.
#[derive(Debug, Default)]
pub struct PersistentStates {
    ids: HashMap<String, u32>,
    stacks: Vec<Arc<[StackEntry]>>,
}

impl PersistentStates {
    /// Id for `stack`, allocating one if the signature is new
    pub fn intern(&mut self, signature: String, stack: &[StackEntry]) -> u32 {
        if let Some(&id) = self.ids.get(&signature) {
            return id;
        }
        let id = PERSISTENT_START + self.stacks.len() as u32;
        debug!("persistent state {} = {:?}", id, signature);
        self.stacks.push(stack.into());
        self.ids.insert(signature, id);
        id
    }

    pub fn id_of(&self, signature: &str) -> Option<u32> {
        self.ids.get(signature).copied()
    }

    pub fn stack(&self, id: u32) -> Option<&Arc<[StackEntry]>> {
        let index = id.checked_sub(PERSISTENT_START)?;
        self.stacks.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

/// Counts of fail-safe degradations, for diagnostics only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// `#pop` requested on an empty stack
    pub stack_underflows: usize,
    /// Runs of non-consuming transitions cut short
    pub transition_loops: usize,
    /// Pushes refused at the stack depth limit
    pub dropped_pushes: usize,
    /// Dynamic regexes that failed to compile after substitution
    pub dynamic_regex_failures: usize,
    /// Previous-line states that referred to no known stack
    pub unknown_states: usize,
}

/// Result of highlighting one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedLine {
    /// Ordered spans covering the whole line
    pub spans: Vec<Span>,
    /// State to hand to the next line
    pub data: LineData,
    pub fold: FoldInfo,
}

/// Per-document highlighting engine
///
/// One instance serves one document, one line at a time. The grammar is
/// shared and read-only, so independent documents may be highlighted on
/// separate threads with separate engines.
#[derive(Debug)]
pub struct Highlighter {
    grammar: Arc<Grammar>,
    limits: EngineConfig,
    persistent: PersistentStates,
    diagnostics: Diagnostics,
    broken: bool,
}

impl Highlighter {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self::with_config(grammar, EngineConfig::default())
    }

    pub fn with_config(grammar: Arc<Grammar>, limits: EngineConfig) -> Self {
        Self {
            grammar,
            limits,
            persistent: PersistentStates::default(),
            diagnostics: Diagnostics::default(),
            broken: false,
        }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn persistent_states(&self) -> &PersistentStates {
        &self.persistent
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// Whether a scan failed and the engine now passes text through
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Highlight `text` given the previous line's data (`None` for line 0)
    ///
    /// The first unrecoverable failure is returned as `MatchEngineBroken`;
    /// from then on every line comes back unhighlighted.
    pub fn highlight_line(
        &mut self,
        text: &str,
        previous: Option<&LineData>,
    ) -> Result<HighlightedLine> {
        if self.broken {
            return Ok(self.plain_line(text, previous));
        }
        match self.scan(text, previous) {
            Ok(line) => Ok(line),
            Err(err) => {
                error!("{}: highlighting disabled: {}", self.grammar.name(), err);
                self.broken = true;
                Err(err)
            }
        }
    }

    /// The line as plain text in the initial context's style
    pub fn plain_line(&self, text: &str, previous: Option<&LineData>) -> HighlightedLine {
        let style = self.grammar.initial_context().style().clone();
        let spans = if text.is_empty() {
            Vec::new()
        } else {
            vec![Span::new(0, text.len(), style)]
        };
        let fold_depth = previous.map_or(0, LineData::fold_depth);
        HighlightedLine {
            spans,
            data: LineData {
                state: LineState::new(fold_depth, ObservableState::Default),
                fold_regions: previous.map(|p| p.fold_regions.clone()).unwrap_or_default(),
                ..LineData::default()
            },
            fold: FoldInfo {
                indent: fold_depth,
                indent_delta: 0,
            },
        }
    }

    fn scan(&mut self, text: &str, previous: Option<&LineData>) -> Result<HighlightedLine> {
        let grammar = Arc::clone(&self.grammar);
        let incoming = previous.map(LineData::observable).unwrap_or_default();
        let stack = self.starting_stack(previous);
        let regions = previous.map(|p| p.fold_regions.clone()).unwrap_or_default();
        let prev_depth = previous.map_or(0, LineData::fold_depth);

        let mut scan = LineScan::new(
            &grammar,
            &self.limits,
            &mut self.diagnostics,
            text,
            stack,
            regions,
            prev_depth,
        );
        scan.run()?;
        let outcome = scan.finish();

        let mut data = LineData {
            fold_regions: outcome.regions,
            ..LineData::default()
        };
        let inherited_original = previous.and_then(|p| p.original);
        let observable = if outcome.will_continue {
            data.resume = Some(self.memoize(&grammar, &outcome.stack));
            data.original = Some(match incoming {
                ObservableState::WillContinue | ObservableState::Continued => {
                    inherited_original.unwrap_or_default()
                }
                started_from => started_from,
            });
            ObservableState::WillContinue
        } else if incoming == ObservableState::WillContinue {
            data.original = inherited_original;
            ObservableState::Continued
        } else if outcome.ends_in_stay && !is_initial_only(&grammar, &outcome.stack) {
            ObservableState::Persistent(self.memoize(&grammar, &outcome.stack))
        } else {
            ObservableState::Default
        };

        let fold_depth = outcome.region_depth.max(0) as u32;
        data.state = LineState::new(fold_depth, observable);
        let fold = FoldInfo {
            indent: (i64::from(prev_depth) + i64::from(outcome.indent_delta)).max(0) as u32,
            indent_delta: outcome.indent_delta,
        };

        Ok(HighlightedLine {
            spans: outcome.spans,
            data,
            fold,
        })
    }

    /// The stack a line starts with; empty means "initial context only"
    fn starting_stack(&mut self, previous: Option<&LineData>) -> Vec<StackEntry> {
        let Some(previous) = previous else {
            return Vec::new();
        };
        let id = match previous.observable() {
            ObservableState::Default => return Vec::new(),
            ObservableState::WillContinue => previous.resume,
            ObservableState::Continued => match previous.original {
                Some(ObservableState::Persistent(id)) => Some(id),
                _ => return Vec::new(),
            },
            ObservableState::Persistent(id) => Some(id),
        };
        match id.and_then(|id| self.persistent.stack(id)) {
            Some(stack) => stack.to_vec(),
            None => {
                warn!(
                    "{}: unknown line state {:?}, restarting in the initial context",
                    self.grammar.name(),
                    previous.state
                );
                self.diagnostics.unknown_states += 1;
                Vec::new()
            }
        }
    }

    fn memoize(&mut self, grammar: &Grammar, stack: &[StackEntry]) -> u32 {
        let signature = stack
            .iter()
            .map(|entry| entry.signature(grammar))
            .collect::<Vec<_>>()
            .join("\u{1f}");
        self.persistent.intern(signature, stack)
    }
}

fn is_initial_only(grammar: &Grammar, stack: &[StackEntry]) -> bool {
    matches!(stack, [StackEntry::Shared(id)] if *id == grammar.initial_id())
}

/// What a finished line scan hands back to the engine
struct ScanOutcome {
    spans: Vec<Span>,
    stack: Vec<StackEntry>,
    regions: Vec<StyleName>,
    region_depth: i64,
    indent_delta: i32,
    will_continue: bool,
    /// The final top context keeps its stack across the line end
    ends_in_stay: bool,
}

/// Working state for one line
struct LineScan<'a> {
    grammar: &'a Grammar,
    limits: &'a EngineConfig,
    diagnostics: &'a mut Diagnostics,
    text: &'a str,
    stack: Vec<StackEntry>,
    /// Captures handed to the next dynamic context push
    captures: Vec<String>,
    /// Style index per byte of `text`
    paint: Vec<u16>,
    styles: Vec<StyleName>,
    regions: Vec<StyleName>,
    region_depth: i64,
    indent_delta: i32,
    will_continue: bool,
    ends_in_stay: bool,
    steps: usize,
    budget: usize,
}

impl<'a> LineScan<'a> {
    fn new(
        grammar: &'a Grammar,
        limits: &'a EngineConfig,
        diagnostics: &'a mut Diagnostics,
        text: &'a str,
        stack: Vec<StackEntry>,
        regions: Vec<StyleName>,
        prev_depth: u32,
    ) -> Self {
        Self {
            grammar,
            limits,
            diagnostics,
            text,
            stack,
            captures: Vec::new(),
            paint: vec![0; text.len()],
            styles: vec![grammar.initial_context().style().clone()],
            regions,
            region_depth: i64::from(prev_depth),
            indent_delta: 0,
            will_continue: false,
            ends_in_stay: false,
            steps: 0,
            budget: (text.len() + 1).saturating_mul(limits.step_budget_per_char),
        }
    }

    fn run(&mut self) -> Result<()> {
        if self.stack.is_empty() {
            self.push(self.grammar.initial_id())?;
        }
        let begin = self.top()?.line_begin;
        self.apply(begin)?;

        let mut progress = ProgressData::new();
        let len = self.text.len();
        let mut stalled = 0;
        while progress.offset() < len {
            let before = progress.offset();
            let entry = self.top_entry()?;
            let context = entry
                .resolve(self.grammar)
                .ok_or_else(|| self.broken("context on stack is missing from grammar"))?;
            self.iterate_rules(&mut progress, context)?;

            if progress.offset() > before {
                stalled = 0;
                continue;
            }
            stalled += 1;
            if stalled > self.limits.max_transitions_per_offset {
                warn!(
                    "{}: transition loop at offset {}, forcing progress",
                    self.grammar.name(),
                    before
                );
                self.diagnostics.transition_loops += 1;
                let style = self.top()?.style().clone();
                self.consume_char(&mut progress, &style);
                stalled = 0;
            }
        }
        progress.finish();

        if !self.will_continue {
            let top = self.top()?;
            let transition = match top.line_empty {
                Some(empty) if len == 0 => empty,
                _ => top.line_end,
            };
            self.captures = progress.captures().to_vec();
            self.apply(transition)?;
            self.ends_in_stay = self.top()?.line_end.is_stay();
        }
        Ok(())
    }

    /// One pass over a context's rules at the cursor
    fn iterate_rules(&mut self, progress: &mut ProgressData, context: &Context) -> Result<()> {
        let len = self.text.len();
        let rules = context.rules();
        let mut matched = false;
        let mut index = 0;
        while index < rules.len() && progress.offset() < len {
            self.tick()?;
            let rule = &rules[index];
            let start = progress.offset();
            if !rule.try_match(self.text, progress, self.grammar) {
                index += 1;
                continue;
            }
            // Nothing consumed and nowhere to go: would match forever
            if progress.offset() == start && rule.transition.is_stay() && !progress.is_will_continue() {
                index += 1;
                continue;
            }

            matched = true;
            if self.on_match(rule, context.style(), start, progress)? {
                break;
            }
            index = 0;
        }

        if matched {
            return Ok(());
        }
        match context.fallthrough {
            Some(fallthrough) if !fallthrough.is_stay() => {
                self.captures = progress.captures().to_vec();
                self.apply(fallthrough)
            }
            _ => {
                self.consume_char(progress, context.style());
                Ok(())
            }
        }
    }

    /// Paint, track folds, run children and transition after a match
    ///
    /// Returns whether the context stack changed.
    fn on_match(
        &mut self,
        rule: &Rule,
        fallback_style: &StyleName,
        start: usize,
        progress: &mut ProgressData,
    ) -> Result<bool> {
        self.track_regions(rule, progress);
        progress.clear_fold_flags();

        let style = rule.style.as_ref().unwrap_or(fallback_style).clone();
        if !rule.look_ahead {
            self.paint(start, progress.offset(), &style);
        }

        if progress.take_will_continue() {
            self.will_continue = true;
            return Ok(false);
        }

        let mut changed = false;
        if !rule.look_ahead {
            changed = self.match_children(&rule.children, &style, progress)?;
        }

        if !rule.transition.is_stay() {
            self.captures = progress.captures().to_vec();
            self.apply(rule.transition)?;
            changed = true;
        }
        Ok(changed)
    }

    /// Children are tried in order right after their parent; first match wins
    fn match_children(
        &mut self,
        children: &[Rule],
        parent_style: &StyleName,
        progress: &mut ProgressData,
    ) -> Result<bool> {
        for child in children {
            self.tick()?;
            let start = progress.offset();
            if child.try_match(self.text, progress, self.grammar) {
                return self.on_match(child, parent_style, start, progress);
            }
        }
        Ok(false)
    }

    fn track_regions(&mut self, rule: &Rule, progress: &ProgressData) {
        if let Some(region) = &rule.begin_region {
            self.regions.push(region.clone());
            self.region_depth += 1;
            if progress.is_opening_at_first_non_space() {
                self.indent_delta += 1;
            }
        }
        if let Some(region) = &rule.end_region {
            if self.regions.last() == Some(region) {
                self.regions.pop();
                self.region_depth -= 1;
                if progress.is_closing_at_non_end() {
                    self.indent_delta -= 1;
                }
            }
        }
    }

    fn apply(&mut self, transition: Transition) -> Result<()> {
        match transition {
            Transition::Stay => {}
            Transition::Pop { count, then } => {
                for _ in 0..count {
                    if self.stack.pop().is_none() {
                        warn!("{}: #pop below the bottom of the context stack", self.grammar.name());
                        self.diagnostics.stack_underflows += 1;
                        break;
                    }
                }
                if self.stack.is_empty() {
                    debug!("{}: context stack emptied, restoring initial context", self.grammar.name());
                    self.push(self.grammar.initial_id())?;
                }
                if let Some(id) = then {
                    self.push(id)?;
                }
            }
            Transition::Push(id) => self.push(id)?,
        }
        Ok(())
    }

    fn push(&mut self, id: ContextId) -> Result<()> {
        if !self.stack.is_empty() && self.stack.len() >= self.limits.max_stack_depth {
            warn!("{}: context stack depth limit reached", self.grammar.name());
            self.diagnostics.dropped_pushes += 1;
            return Ok(());
        }
        let context = self
            .grammar
            .context_by_id(id)
            .ok_or_else(|| self.broken("transition to a context missing from grammar"))?;
        if context.is_dynamic() {
            let (instance, failures) = context.instantiate(&self.captures);
            self.diagnostics.dynamic_regex_failures += failures;
            self.stack.push(StackEntry::Owned(Arc::new(instance)));
        } else {
            self.stack.push(StackEntry::Shared(id));
        }
        Ok(())
    }

    fn top_entry(&self) -> Result<StackEntry> {
        self.stack
            .last()
            .cloned()
            .ok_or_else(|| self.broken("context stack is empty"))
    }

    /// Copy of the top context's transition data
    fn top(&self) -> Result<TopContext> {
        let entry = self.top_entry()?;
        let context = entry
            .resolve(self.grammar)
            .ok_or_else(|| self.broken("context on stack is missing from grammar"))?;
        Ok(TopContext {
            style: context.style().clone(),
            line_begin: context.line_begin(),
            line_end: context.line_end(),
            line_empty: context.line_empty(),
        })
    }

    /// Fail-safe: style one character as plain context text
    fn consume_char(&mut self, progress: &mut ProgressData, style: &StyleName) {
        let start = progress.offset();
        if let Some(c) = self.text.get(start..).and_then(|rest| rest.chars().next()) {
            if !c.is_whitespace() {
                progress.clear_only_spaces();
            }
        }
        progress.advance_char(self.text);
        self.paint(start, progress.offset(), style);
    }

    fn paint(&mut self, start: usize, end: usize, style: &StyleName) {
        let end = end.min(self.paint.len());
        if start >= end {
            return;
        }
        let index = match self.styles.iter().position(|s| s == style) {
            Some(index) => index,
            None => {
                self.styles.push(style.clone());
                self.styles.len() - 1
            }
        };
        let index = u16::try_from(index).unwrap_or(0);
        self.paint[start..end].fill(index);
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.budget {
            return Err(self.broken("step budget exhausted"));
        }
        Ok(())
    }

    fn broken(&self, reason: &str) -> HighlightError {
        HighlightError::MatchEngineBroken(format!("{}: {}", self.grammar.name(), reason))
    }

    fn finish(self) -> ScanOutcome {
        let mut spans: Vec<Span> = Vec::new();
        let mut run_start = 0;
        for at in 1..=self.paint.len() {
            if at == self.paint.len() || self.paint[at] != self.paint[run_start] {
                let style = self.styles[self.paint[run_start] as usize].clone();
                spans.push(Span::new(run_start, at, style));
                run_start = at;
            }
        }
        ScanOutcome {
            spans,
            stack: self.stack,
            regions: self.regions,
            region_depth: self.region_depth,
            indent_delta: self.indent_delta,
            will_continue: self.will_continue,
            ends_in_stay: self.ends_in_stay,
        }
    }
}

/// Transition data of the context on top of the stack
struct TopContext {
    style: StyleName,
    line_begin: Transition,
    line_end: Transition,
    line_empty: Option<Transition>,
}

impl TopContext {
    fn style(&self) -> &StyleName {
        &self.style
    }
}
