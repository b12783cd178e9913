//! Editor facade: owns the document, the selection, and the history.
//!
//! All mutation funnels through [`Editor::apply`], which records the
//! operation in the history unless an undo/redo replay is in progress.
//! Structural invariant checks run at batch boundaries, so a multi-step
//! transform may pass through invalid intermediate states.

use log::trace;
use std::time::Instant;

use crate::doc::Document;
use crate::history::History;
use crate::op::Operation;
use crate::selection::Selection;

pub struct Editor {
    doc: Document,
    selection: Option<Selection>,
    history: History,
    replaying: bool,
    batch_depth: usize,
    ops_in_batch: usize,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    /// Wrap an existing document. The document must already satisfy the
    /// structural invariants.
    pub fn with_document(doc: Document) -> Self {
        doc.validate().expect("initial document is invalid");
        Self {
            doc,
            selection: None,
            history: History::new(),
            replaying: false,
            batch_depth: 0,
            ops_in_batch: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Apply one operation, recording it unless a replay is in progress.
    pub fn apply(&mut self, op: Operation) {
        self.apply_at(op, Instant::now());
    }

    /// [`Editor::apply`] with an explicit recording timestamp, so tests
    /// can replay pauses without sleeping.
    pub fn apply_at(&mut self, op: Operation, now: Instant) {
        if !self.replaying {
            self.history.record(op.clone(), self.ops_in_batch > 0, now);
        }
        op.apply(&mut self.doc, &mut self.selection);
        self.ops_in_batch += 1;
        if self.batch_depth == 0 {
            self.finish_tick();
        }
    }

    /// Run `f` as one synchronous batch: every operation it applies is
    /// recorded into the same history state, and invariant checks are
    /// deferred until the batch completes.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let out = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.finish_tick();
        }
        out
    }

    /// Run `f` with every operation it produces forced into one dedicated
    /// history state that never merges with its neighbors.
    pub fn isolate(&mut self, f: impl FnOnce(&mut Self)) {
        self.history.begin_isolation();
        self.batch(f);
        self.history.end_isolation();
    }

    /// Move the selection. Recorded into history (and therefore restored
    /// by undo) only when there was a selection before.
    pub fn select(&mut self, selection: Selection) {
        let op = Operation::SetSelection {
            before: self.selection.clone(),
            after: Some(selection),
        };
        self.apply(op);
    }

    pub fn deselect(&mut self) {
        let op = Operation::SetSelection {
            before: self.selection.clone(),
            after: None,
        };
        self.apply(op);
    }

    /// Undo the most recent history state. A no-op when there is nothing
    /// to undo.
    pub fn undo(&mut self) {
        let Some(state) = self.history.pop_undo() else {
            return;
        };

        self.replaying = true;
        for op in state.operations.iter().rev() {
            trace!("undo op: {:?}", op);
            op.inverse().apply(&mut self.doc, &mut self.selection);
        }
        self.replaying = false;

        self.history.push_redo(state);
        self.finish_tick();
    }

    /// Re-apply the most recently undone state. A no-op when there is
    /// nothing to redo.
    pub fn redo(&mut self) {
        let Some(state) = self.history.pop_redo() else {
            return;
        };

        self.replaying = true;
        for op in &state.operations {
            trace!("redo op: {:?}", op);
            op.apply(&mut self.doc, &mut self.selection);
        }
        self.replaying = false;

        self.history.push_undo(state);
        self.finish_tick();
    }

    fn finish_tick(&mut self) {
        self.ops_in_batch = 0;
        if let Err(err) = self.doc.validate() {
            panic!("document invariant violated at batch boundary: {err}");
        }
    }
}
