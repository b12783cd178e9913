//! Undo/redo history with operation coalescing.
//!
//! Operations are grouped into [`HistoryState`] batches. Rapid keystrokes
//! coalesce into one state; a pause longer than [`MAX_PAUSE`], or a
//! non-contiguous edit, starts a fresh one. The stacks are bounded at
//! [`MAX_STACK`] entries, oldest dropped first.

use log::{debug, trace};
use std::time::{Duration, Instant};

use crate::op::Operation;

/// Maximum number of undo states kept.
pub const MAX_STACK: usize = 200;

/// Longest pause between contiguous text edits that still coalesces.
pub const MAX_PAUSE: Duration = Duration::from_millis(1000);

/// One undoable unit: a batch of operations recorded together.
#[derive(Debug, Clone)]
pub struct HistoryState {
    pub operations: Vec<Operation>,
    pub last_operation_time: Instant,
    /// Sealed states never accept further operations. Set on states
    /// produced under [`History::begin_isolation`].
    sealed: bool,
}

/// The undo/redo stacks. Owned by the editor; mutated only through the
/// recording and undo/redo entry points.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryState>,
    redo_stack: Vec<HistoryState>,
    isolating: bool,
    isolated_open: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            isolating: false,
            isolated_open: false,
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Record one operation. `same_batch` is true when other operations
    /// have already been recorded in the current synchronous batch.
    ///
    /// A selection change with an incomplete before/after is not an
    /// editing operation and is not recorded at all.
    pub fn record(&mut self, op: Operation, same_batch: bool, now: Instant) {
        if let Operation::SetSelection { before, after } = &op {
            if before.is_none() || after.is_none() {
                return;
            }
        }

        let reuse = if self.isolating {
            self.isolated_open
        } else {
            match self.undo_stack.last() {
                Some(top) if !top.sealed => {
                    same_batch
                        || op.is_selection()
                        || (now.duration_since(top.last_operation_time) <= MAX_PAUSE
                            && contiguous(last_edit(top), &op))
                }
                _ => false,
            }
        };

        if !reuse {
            trace!("starting new history state (isolating: {})", self.isolating);
            self.undo_stack.push(HistoryState {
                operations: Vec::new(),
                last_operation_time: now,
                sealed: self.isolating,
            });
            trim(&mut self.undo_stack);
            if self.isolating {
                self.isolated_open = true;
            }
        }

        let top = self.undo_stack.last_mut().expect("undo stack cannot be empty here");

        // Consecutive selection changes collapse to one operation that
        // keeps the earliest `before` and the latest `after`.
        match (top.operations.last_mut(), &op) {
            (
                Some(Operation::SetSelection { after: prev_after, .. }),
                Operation::SetSelection { after, .. },
            ) => {
                *prev_after = after.clone();
            }
            _ => top.operations.push(op.clone()),
        }
        top.last_operation_time = now;

        if !op.is_selection() {
            self.redo_stack.clear();
        }
    }

    /// Force every operation recorded until [`end_isolation`] into one
    /// dedicated state that never merges with its neighbors.
    ///
    /// [`end_isolation`]: History::end_isolation
    pub fn begin_isolation(&mut self) {
        debug_assert!(!self.isolating, "isolation does not nest");
        self.isolating = true;
        self.isolated_open = false;
    }

    pub fn end_isolation(&mut self) {
        self.isolating = false;
        self.isolated_open = false;
    }

    /// Pop the most recent state for undo replay. The caller applies the
    /// inverses and hands the state back via [`History::push_redo`].
    pub fn pop_undo(&mut self) -> Option<HistoryState> {
        let state = self.undo_stack.pop();
        if let Some(s) = &state {
            debug!("undo: replaying {} operations", s.operations.len());
        }
        state
    }

    pub fn push_redo(&mut self, state: HistoryState) {
        self.redo_stack.push(state);
        trim(&mut self.redo_stack);
    }

    /// Pop the most recently undone state for redo replay. The caller
    /// re-applies its operations and hands it back via
    /// [`History::push_undo`].
    pub fn pop_redo(&mut self) -> Option<HistoryState> {
        let state = self.redo_stack.pop();
        if let Some(s) = &state {
            debug!("redo: replaying {} operations", s.operations.len());
        }
        state
    }

    pub fn push_undo(&mut self, state: HistoryState) {
        self.undo_stack.push(state);
        trim(&mut self.undo_stack);
    }
}

fn trim(stack: &mut Vec<HistoryState>) {
    if stack.len() > MAX_STACK {
        let drop_count = stack.len() - MAX_STACK;
        stack.drain(0..drop_count);
    }
}

/// Last non-selection operation of a state, the one contiguity is
/// measured against (a trailing caret move does not break typing).
fn last_edit(state: &HistoryState) -> Option<&Operation> {
    state.operations.iter().rev().find(|op| !op.is_selection())
}

/// True when `next` continues `prev` without a gap: an insertion at the
/// previous insertion's end, or a removal ending at the previous
/// removal's start (backspacing).
fn contiguous(prev: Option<&Operation>, next: &Operation) -> bool {
    match (prev, next) {
        (
            Some(Operation::InsertText {
                path: prev_path,
                offset: prev_offset,
                text: prev_text,
            }),
            Operation::InsertText { path, offset, .. },
        ) => path == prev_path && *offset == prev_offset + prev_text.chars().count(),
        (
            Some(Operation::RemoveText {
                path: prev_path,
                offset: prev_offset,
                ..
            }),
            Operation::RemoveText { path, offset, text },
        ) => path == prev_path && offset + text.chars().count() == *prev_offset,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Path;
    use crate::selection::{Point, Selection};

    fn insert(offset: usize, text: &str) -> Operation {
        Operation::InsertText {
            path: Path::inline(0, 0),
            offset,
            text: text.into(),
        }
    }

    fn remove(offset: usize, text: &str) -> Operation {
        Operation::RemoveText {
            path: Path::inline(0, 0),
            offset,
            text: text.into(),
        }
    }

    fn select(offset: usize) -> Operation {
        let sel = Selection::caret(Point::new(Path::inline(0, 0), offset));
        Operation::SetSelection {
            before: Some(sel.clone()),
            after: Some(sel),
        }
    }

    #[test]
    fn consecutive_typing_coalesces_into_one_state() {
        let mut history = History::new();
        let t0 = Instant::now();

        for (i, ch) in ["a", "b", "c", "d"].into_iter().enumerate() {
            history.record(insert(i, ch), false, t0 + Duration::from_millis(i as u64 * 100));
        }

        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn pause_beyond_window_starts_new_state() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(insert(0, "a"), false, t0);
        history.record(insert(1, "b"), false, t0 + Duration::from_millis(500));
        history.record(insert(2, "c"), false, t0 + Duration::from_millis(2000));

        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn non_contiguous_insert_starts_new_state() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(insert(0, "a"), false, t0);
        // Insertion elsewhere in the run, even without a pause.
        history.record(insert(5, "b"), false, t0 + Duration::from_millis(10));

        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn backspacing_coalesces() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(remove(3, "d"), false, t0);
        history.record(remove(2, "c"), false, t0 + Duration::from_millis(100));
        history.record(remove(1, "b"), false, t0 + Duration::from_millis(200));

        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.pop_undo().unwrap().operations.len(), 3);
    }

    #[test]
    fn same_batch_always_merges() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(insert(0, "a"), false, t0);
        // Structurally unrelated, but queued in the same event tick.
        history.record(remove(9, "z"), true, t0);

        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn selection_changes_merge_and_collapse() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(insert(0, "a"), false, t0);
        history.record(select(1), false, t0 + Duration::from_millis(5000));
        history.record(select(0), false, t0 + Duration::from_millis(6000));

        assert_eq!(history.undo_depth(), 1);
        let state = history.pop_undo().unwrap();
        // Two selection ops collapsed into one.
        assert_eq!(state.operations.len(), 2);
    }

    #[test]
    fn partial_selection_change_is_not_recorded() {
        let mut history = History::new();
        let op = Operation::SetSelection {
            before: None,
            after: Some(Selection::caret(Point::new(Path::inline(0, 0), 0))),
        };

        history.record(op, false, Instant::now());
        assert_eq!(history.undo_depth(), 0);
    }

    #[test]
    fn selection_only_state_never_clears_redo() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(insert(0, "a"), false, t0);
        let state = history.pop_undo().unwrap();
        history.push_redo(state);
        assert!(history.can_redo());

        history.record(select(0), false, t0 + Duration::from_millis(5000));
        assert!(history.can_redo());

        history.record(insert(0, "b"), false, t0 + Duration::from_millis(5001));
        assert!(!history.can_redo());
    }

    #[test]
    fn isolation_seals_a_dedicated_state() {
        let mut history = History::new();
        let t0 = Instant::now();

        history.record(insert(0, "a"), false, t0);

        history.begin_isolation();
        history.record(insert(1, "b"), false, t0 + Duration::from_millis(10));
        history.record(remove(9, "z"), false, t0 + Duration::from_millis(20));
        history.end_isolation();

        // Contiguous typing right after, well within the pause window:
        // must still start a new state because the top one is sealed.
        history.record(insert(2, "c"), false, t0 + Duration::from_millis(30));

        assert_eq!(history.undo_depth(), 3);
    }

    #[test]
    fn stack_is_capped_at_max_entries() {
        let mut history = History::new();
        let t0 = Instant::now();

        for i in 0..(MAX_STACK + 7) {
            // Far apart in time so nothing coalesces.
            history.record(insert(0, "x"), false, t0 + Duration::from_secs(i as u64 * 10));
        }

        assert_eq!(history.undo_depth(), MAX_STACK);
    }
}
