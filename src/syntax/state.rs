//! Per-line highlighting state
//!
//! The host keeps one `LineData` per document line and hands the previous
//! line's value back when highlighting the next one.

use super::style::StyleName;

/// First id handed out for memoized context stacks
pub const PERSISTENT_START: u32 = 3;

/// What a line tells the next line about where to resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObservableState {
    /// Resume in the grammar's initial context
    #[default]
    Default,
    /// The line ended in a continuation character
    WillContinue,
    /// The line directly follows a `WillContinue` line
    Continued,
    /// Resume from a memoized context stack (id >= `PERSISTENT_START`)
    Persistent(u32),
}

impl ObservableState {
    pub fn to_raw(self) -> u32 {
        match self {
            ObservableState::Default => 0,
            ObservableState::WillContinue => 1,
            ObservableState::Continued => 2,
            ObservableState::Persistent(id) => id,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ObservableState::Default,
            1 => ObservableState::WillContinue,
            2 => ObservableState::Continued,
            id => ObservableState::Persistent(id),
        }
    }
}

/// Fold depth plus observable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineState {
    /// Fold regions open at the end of the line
    pub fold_depth: u32,
    pub observable: ObservableState,
}

impl LineState {
    pub fn new(fold_depth: u32, observable: ObservableState) -> Self {
        Self {
            fold_depth,
            observable,
        }
    }

    /// Pack into one integer for host storage: depth high, state low
    pub fn to_bits(self) -> u64 {
        (u64::from(self.fold_depth) << 32) | u64::from(self.observable.to_raw())
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            fold_depth: (bits >> 32) as u32,
            observable: ObservableState::from_raw(bits as u32),
        }
    }
}

/// Everything the next line needs from this one
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineData {
    pub state: LineState,
    /// Names of the fold regions open at the end of the line, innermost last
    pub fold_regions: Vec<StyleName>,
    /// Memoized stack the next line continues with (`WillContinue` only)
    pub(crate) resume: Option<u32>,
    /// State the current continuation run started from
    pub(crate) original: Option<ObservableState>,
}

impl LineData {
    pub fn observable(&self) -> ObservableState {
        self.state.observable
    }

    pub fn fold_depth(&self) -> u32 {
        self.state.fold_depth
    }
}

/// Folding result for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FoldInfo {
    /// Fold level the line itself is shown at
    pub indent: u32,
    /// Adjustment from markers at the first non-space / before the end
    pub indent_delta: i32,
}

impl FoldInfo {
    /// The line opens a region at its start and belongs to it
    pub fn start_included(&self) -> bool {
        self.indent_delta > 0
    }

    /// The previous line still belongs to the region closed here
    pub fn previous_end_included(&self) -> bool {
        self.indent_delta >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observable_raw() {
        assert_eq!(ObservableState::Default.to_raw(), 0);
        assert_eq!(ObservableState::from_raw(1), ObservableState::WillContinue);
        assert_eq!(ObservableState::from_raw(2), ObservableState::Continued);
        assert_eq!(ObservableState::from_raw(7), ObservableState::Persistent(7));
    }

    #[test]
    fn test_line_state_bits() {
        let state = LineState::new(5, ObservableState::Persistent(PERSISTENT_START + 40));
        let bits = state.to_bits();
        assert_eq!(bits >> 32, 5);
        assert_eq!(LineState::from_bits(bits), state);
        assert_eq!(LineState::from_bits(0), LineState::default());
    }

    #[test]
    fn test_fold_flags() {
        let opening = FoldInfo { indent: 1, indent_delta: 1 };
        assert!(opening.start_included());
        assert!(opening.previous_end_included());

        let closing = FoldInfo { indent: 0, indent_delta: -1 };
        assert!(!closing.start_included());
        assert!(!closing.previous_end_included());
    }
}
