//! Syntax highlighting manager
//!
//! This module provides the SyntaxManager that owns the loaded grammars and
//! detects languages, and the DocumentHighlighter that keeps per-line results
//! for one document and re-highlights only what an edit invalidates.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::{Config, EngineConfig};
use crate::error::Result;

use super::builtin;
use super::definition::GrammarDef;
use super::grammar::Grammar;
use super::highlighter::{Diagnostics, HighlightedLine, Highlighter};
use super::state::{FoldInfo, LineData};
use super::style::Span;

/// Per-document highlighting cache
///
/// Holds one result per line. A line whose result is `None` has not been
/// highlighted since it was inserted.
#[derive(Debug)]
pub struct DocumentHighlighter {
    highlighter: Highlighter,
    lines: Vec<Option<HighlightedLine>>,
}

impl DocumentHighlighter {
    /// Create an empty cache for documents in `grammar`
    pub fn new(grammar: Arc<Grammar>, limits: EngineConfig) -> Self {
        Self {
            highlighter: Highlighter::with_config(grammar, limits),
            lines: Vec::new(),
        }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        self.highlighter.grammar()
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.highlighter.diagnostics()
    }

    /// Whether the engine gave up and lines now come back as plain text
    pub fn is_broken(&self) -> bool {
        self.highlighter.is_broken()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Highlight a whole document from scratch
    pub fn highlight_all<S: AsRef<str>>(&mut self, lines: &[S]) {
        self.lines = vec![None; lines.len()];
        for index in 0..lines.len() {
            self.refresh(index, lines[index].as_ref());
        }
    }

    /// Re-highlight after line `index` changed
    ///
    /// Continues down the document until a line's outgoing state matches
    /// what was cached before. Returns the number of lines re-highlighted.
    pub fn line_changed<S: AsRef<str>>(&mut self, index: usize, lines: &[S]) -> usize {
        self.lines.resize(lines.len(), None);
        let mut count = 0;
        for at in index..lines.len() {
            let before = self.lines[at].as_ref().map(|line| line.data.clone());
            self.refresh(at, lines[at].as_ref());
            count += 1;
            let after = self.lines[at].as_ref().map(|line| &line.data);
            if at > index && before.as_ref() == after {
                break;
            }
        }
        debug!("re-highlighted {} line(s) from {}", count, index);
        count
    }

    /// Account for `count` lines inserted before `at`; `lines` is the new text
    pub fn insert_lines<S: AsRef<str>>(&mut self, at: usize, count: usize, lines: &[S]) -> usize {
        let at = at.min(self.lines.len());
        self.lines
            .splice(at..at, std::iter::repeat_with(|| None).take(count));
        if at < lines.len() {
            self.line_changed(at, lines)
        } else {
            self.lines.resize(lines.len(), None);
            0
        }
    }

    /// Account for `count` lines removed at `at`; `lines` is the new text
    pub fn remove_lines<S: AsRef<str>>(&mut self, at: usize, count: usize, lines: &[S]) -> usize {
        let start = at.min(self.lines.len());
        let end = at.saturating_add(count).min(self.lines.len());
        self.lines.drain(start..end);
        if start < lines.len() {
            // The line now at `start` follows a different predecessor
            if let Some(line) = self.lines.get_mut(start) {
                *line = None;
            }
            self.line_changed(start, lines)
        } else {
            self.lines.resize(lines.len(), None);
            0
        }
    }

    /// Spans of line `index`, if it has been highlighted
    pub fn spans(&self, index: usize) -> Option<&[Span]> {
        self.line(index).map(|line| line.spans.as_slice())
    }

    pub fn line_data(&self, index: usize) -> Option<&LineData> {
        self.line(index).map(|line| &line.data)
    }

    pub fn fold(&self, index: usize) -> Option<FoldInfo> {
        self.line(index).map(|line| line.fold)
    }

    pub fn line(&self, index: usize) -> Option<&HighlightedLine> {
        self.lines.get(index).and_then(Option::as_ref)
    }

    fn refresh(&mut self, index: usize, text: &str) {
        let previous = match index {
            0 => None,
            _ => self.lines[index - 1].as_ref().map(|line| line.data.clone()),
        };
        let result = match self.highlighter.highlight_line(text, previous.as_ref()) {
            Ok(line) => line,
            Err(_) => self.highlighter.plain_line(text, previous.as_ref()),
        };
        self.lines[index] = Some(result);
    }
}

/// Main syntax highlighting manager
pub struct SyntaxManager {
    /// Loaded grammars
    grammars: HashMap<String, Arc<Grammar>>,
    /// Extension to grammar name mapping
    extension_map: HashMap<String, String>,
    limits: EngineConfig,
    /// Whether syntax highlighting is enabled
    pub enabled: bool,
}

impl SyntaxManager {
    /// Create a new syntax manager with built-in grammars
    pub fn new() -> Self {
        let mut manager = Self {
            grammars: HashMap::new(),
            extension_map: HashMap::new(),
            limits: EngineConfig::default(),
            enabled: true,
        };

        for def in builtin::all_definitions() {
            if let Err(err) = manager.add_definition(&def) {
                error!("built-in grammar {} rejected: {}", def.name, err);
            }
        }

        manager
    }

    /// Create a manager configured by `config`, loading its grammar directories
    pub fn from_config(config: &Config) -> Self {
        let mut manager = Self::new();
        manager.enabled = config.enabled;
        manager.limits = config.engine.clone();
        for dir in &config.grammar_dirs {
            if let Err(err) = manager.load_dir(dir) {
                warn!("cannot read grammar directory {}: {}", dir.display(), err);
            }
        }
        manager
    }

    /// Resolve and add a grammar definition
    pub fn add_definition(&mut self, def: &GrammarDef) -> Result<()> {
        let grammar = Grammar::from_def(def)?;
        self.add_grammar(Arc::new(grammar));
        Ok(())
    }

    /// Add a grammar, replacing any grammar with the same name
    pub fn add_grammar(&mut self, grammar: Arc<Grammar>) {
        let name = grammar.name().to_string();
        for ext in grammar.extensions() {
            self.extension_map.insert(ext.to_lowercase(), name.clone());
        }
        self.grammars.insert(name, grammar);
    }

    /// Load every `*.toml` grammar in `dir`
    ///
    /// Files that fail to parse or resolve are skipped with a warning.
    /// Returns the number of grammars added.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match GrammarDef::load(&path).and_then(|def| self.add_definition(&def)) {
                Ok(()) => {
                    info!("loaded grammar from {}", path.display());
                    loaded += 1;
                }
                Err(err) => warn!("skipping {}: {}", path.display(), err),
            }
        }
        Ok(loaded)
    }

    /// Detect grammar from filename
    pub fn detect_grammar(&self, filename: &Path) -> Option<&str> {
        let ext = filename.extension()?.to_str()?.to_lowercase();
        self.extension_map.get(&ext).map(|s| s.as_str())
    }

    /// Get a grammar by name
    pub fn get_grammar(&self, name: &str) -> Option<Arc<Grammar>> {
        self.grammars.get(name).cloned()
    }

    /// List available grammars
    pub fn list_grammars(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.grammars.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Engine limits handed to new documents
    pub fn limits(&self) -> &EngineConfig {
        &self.limits
    }

    /// A fresh document cache for the named grammar
    ///
    /// `None` when highlighting is disabled or the grammar is unknown.
    pub fn document(&self, name: &str) -> Option<DocumentHighlighter> {
        if !self.enabled {
            return None;
        }
        let grammar = self.get_grammar(name)?;
        Some(DocumentHighlighter::new(grammar, self.limits.clone()))
    }

    /// A fresh document cache for the grammar matching `filename`
    pub fn document_for_path(&self, filename: &Path) -> Option<DocumentHighlighter> {
        let name = self.detect_grammar(filename)?;
        self.document(name)
    }

    /// Toggle syntax highlighting on/off
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }
}

impl Default for SyntaxManager {
    fn default() -> Self {
        Self::new()
    }
}
