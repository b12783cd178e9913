//! Formatting operations: the structural transforms a toolbar or key
//! handler invokes against the editor.
//!
//! Every transform reads the current selection, emits low-level
//! operations through [`Editor::apply`], and runs as one synchronous
//! batch so invariant checks are deferred to the end. Partially covered
//! text runs and links are split at the selection boundary first, so a
//! transform only ever touches the selected portion.

use log::debug;

use crate::doc::{
    Block, BlockKind, FormattedText, Inline, Link, LinkTarget, Mark, Path, MAX_INDENT,
};
use crate::editor::Editor;
use crate::op::{Node, NodeProps, Operation};
use crate::selection::{Point, Selection};

/// Inline-level coverage of the selection after boundary splitting:
/// whole inlines from `start_inline` (inclusive, in `start_block`) to
/// `end_inline` (exclusive, in `end_block`).
#[derive(Debug, Clone, Copy)]
struct InlineCoverage {
    start_block: usize,
    start_inline: usize,
    end_block: usize,
    end_inline: usize,
}

impl InlineCoverage {
    fn bounds(&self, block: usize, block_len: usize) -> (usize, usize) {
        let lo = if block == self.start_block {
            self.start_inline
        } else {
            0
        };
        let hi = if block == self.end_block {
            self.end_inline
        } else {
            block_len
        };
        (lo, hi)
    }
}

impl Editor {
    // --- block-level transforms -----------------------------------------

    /// Set every selected block to `target`, or back to a paragraph when
    /// it already has that kind (the operation is a toggle). Indent is
    /// adjusted on list/non-list transitions.
    pub fn format_block(&mut self, target: BlockKind) {
        let Some((start, end)) = self.selected_block_range() else {
            return;
        };
        debug!("format_block {:?} over blocks {}..={}", target, start, end);

        self.batch(|ed| {
            for b in start..=end {
                let block = ed.document().block(b);
                let effective = if block.kind != target {
                    target
                } else {
                    BlockKind::Paragraph
                };
                let indent = match (block.kind.is_list(), effective.is_list()) {
                    (false, true) => (block.indent + 1).min(MAX_INDENT),
                    (true, false) => block.indent.saturating_sub(1),
                    _ => block.indent,
                };
                if effective == block.kind && indent == block.indent {
                    continue;
                }
                ed.apply(Operation::SetNodeProperties {
                    path: Path::block(b),
                    before: NodeProps {
                        kind: Some(block.kind),
                        indent: Some(block.indent),
                        ..NodeProps::default()
                    },
                    after: NodeProps {
                        kind: Some(effective),
                        indent: Some(indent),
                        ..NodeProps::default()
                    },
                });
            }
        });
    }

    /// Indent every selected block by one level, clamped at
    /// [`MAX_INDENT`]. Blocks already at the bound are left unchanged.
    pub fn indent(&mut self) {
        self.shift_indent(1);
    }

    /// Unindent every selected block by one level, clamped at the
    /// block kind's minimum (1 for list items, 0 otherwise).
    pub fn unindent(&mut self) {
        self.shift_indent(-1);
    }

    fn shift_indent(&mut self, delta: i16) {
        let Some((start, end)) = self.selected_block_range() else {
            return;
        };

        self.batch(|ed| {
            for b in start..=end {
                let block = ed.document().block(b);
                let min = block.kind.min_indent() as i16;
                let next = (block.indent as i16 + delta).clamp(min, MAX_INDENT as i16) as u8;
                if next == block.indent {
                    continue;
                }
                ed.apply(Operation::SetNodeProperties {
                    path: Path::block(b),
                    before: NodeProps {
                        indent: Some(block.indent),
                        ..NodeProps::default()
                    },
                    after: NodeProps {
                        indent: Some(next),
                        ..NodeProps::default()
                    },
                });
            }
        });
    }

    // --- mark formatting ------------------------------------------------

    /// Toggle a text mark across the selection. If every covered run
    /// already carries the mark it is removed, otherwise it is added.
    /// Setting subscript clears superscript on the same run, and vice
    /// versa.
    pub fn format_text(&mut self, mark: Mark) {
        let Some(sel) = self.selection().cloned() else {
            return;
        };
        if sel.is_collapsed() {
            return;
        }

        self.batch(|ed| {
            let runs: Vec<Path> = ed
                .split_run_boundaries()
                .into_iter()
                .filter(|p| ed.run_len(p) > 0)
                .collect();
            if runs.is_empty() {
                return;
            }

            let on = !runs.iter().all(|p| ed.document().text_at(p).mark(mark));
            for path in &runs {
                let run = ed.document().text_at(path);
                let mut before = NodeProps::default();
                let mut after = NodeProps::default();
                set_mark_prop(&mut before, mark, run.mark(mark));
                set_mark_prop(&mut after, mark, on);

                // Sub- and superscript are mutually exclusive.
                if on {
                    match mark {
                        Mark::Subscript => {
                            set_mark_prop(&mut before, Mark::Superscript, run.superscript);
                            set_mark_prop(&mut after, Mark::Superscript, false);
                        }
                        Mark::Superscript => {
                            set_mark_prop(&mut before, Mark::Subscript, run.subscript);
                            set_mark_prop(&mut after, Mark::Subscript, false);
                        }
                        _ => {}
                    }
                }

                if before == after {
                    continue;
                }
                ed.apply(Operation::SetNodeProperties {
                    path: path.clone(),
                    before,
                    after,
                });
            }
        });
    }

    // --- links ----------------------------------------------------------

    /// Wrap the selection in a link. A collapsed selection inside an
    /// existing link updates that link's target in place; otherwise any
    /// links overlapping the range are unwrapped first (links never
    /// nest) and the range is wrapped in a new link per block.
    pub fn wrap_link(&mut self, target: LinkTarget) {
        let Some(sel) = self.selection().cloned() else {
            return;
        };

        if sel.is_collapsed() {
            if let &[b, i, _] = sel.anchor.path.0.as_slice() {
                let Inline::Link(link) = &self.document().block(b).inlines[i] else {
                    panic!("caret path {:?} is not inside a link", sel.anchor.path)
                };
                let before = link.target.clone();
                self.apply(Operation::SetNodeProperties {
                    path: Path::inline(b, i),
                    before: NodeProps {
                        target: Some(before),
                        ..NodeProps::default()
                    },
                    after: NodeProps {
                        target: Some(target),
                        ..NodeProps::default()
                    },
                });
            }
            return;
        }

        self.batch(|ed| {
            ed.unwrap_links_in_selection();
            let Some(cov) = ed.split_inline_boundaries() else {
                return;
            };
            if ed.coverage_is_empty(&cov) {
                return;
            }

            let mut first: Option<(usize, usize)> = None;
            let mut focus: Option<(usize, usize)> = None;

            for blk in (cov.start_block..=cov.end_block).rev() {
                let len = ed.document().block(blk).inlines.len();
                let (lo, hi) = cov.bounds(blk, len);
                if lo >= hi {
                    continue;
                }
                first = Some((blk, lo));

                let texts: Vec<FormattedText> = ed.document().block(blk).inlines[lo..hi]
                    .iter()
                    .map(|inline| match inline {
                        Inline::Text(t) => t.clone(),
                        Inline::Link(_) => unreachable!("overlapping links were unwrapped"),
                    })
                    .collect();
                if texts.iter().all(|t| t.text.is_empty()) {
                    focus = focus.or(Some((blk, hi - 1)));
                    continue;
                }

                for i in (lo..hi).rev() {
                    ed.remove_inline(blk, i);
                }
                ed.apply(Operation::InsertNode {
                    path: Path::inline(blk, lo),
                    node: Node::Inline(Inline::Link(Link {
                        target: target.clone(),
                        children: texts,
                    })),
                });

                focus = focus.or(Some((blk, lo)));
            }

            if let (Some((ab, ai)), Some((fb, fi))) = (first, focus) {
                let anchor = Point::new(ed.first_run_path(ab, ai), 0);
                let fpath = ed.last_run_path(fb, fi);
                let flen = ed.run_len(&fpath);
                let before = ed.selection().cloned();
                ed.apply(Operation::SetSelection {
                    before,
                    after: Some(Selection::new(anchor, Point::new(fpath, flen))),
                });
            }
        });
    }

    /// Unwrap the link(s) touching the selection. A non-collapsed range
    /// is split at its boundaries first so only the selected portion is
    /// affected.
    pub fn remove_link(&mut self) {
        self.batch(|ed| ed.unwrap_links_in_selection());
    }

    fn unwrap_links_in_selection(&mut self) {
        let Some(sel) = self.selection().cloned() else {
            return;
        };

        if sel.is_collapsed() {
            // A caret inside a link dissolves the whole link.
            if let &[b, i, c] = sel.anchor.path.0.as_slice() {
                self.unwrap_link(b, i);
                let before = self.selection().cloned();
                let after = Selection::caret(Point::new(
                    Path::inline(b, i + c),
                    sel.anchor.offset,
                ));
                self.apply(Operation::SetSelection {
                    before,
                    after: Some(after),
                });
            }
            return;
        }

        let Some(cov) = self.split_inline_boundaries() else {
            return;
        };
        if self.coverage_is_empty(&cov) {
            return;
        }

        let mut end_bound = cov.end_inline;
        for blk in (cov.start_block..=cov.end_block).rev() {
            let len = self.document().block(blk).inlines.len();
            let (lo, hi) = cov.bounds(blk, len);
            for i in (lo..hi).rev() {
                if let Inline::Link(link) = &self.document().block(blk).inlines[i] {
                    let children = link.children.len();
                    self.unwrap_link(blk, i);
                    if blk == cov.end_block {
                        end_bound += children - 1;
                    }
                }
            }
        }

        let (ab, ai) = self.coverage_first(&cov);
        let anchor = Point::new(self.first_run_path(ab, ai), 0);
        let (fb, fi) = if end_bound > 0 {
            (cov.end_block, end_bound - 1)
        } else {
            let blk = cov.end_block - 1;
            (blk, self.document().block(blk).inlines.len() - 1)
        };
        let fpath = self.last_run_path(fb, fi);
        let flen = self.run_len(&fpath);
        let before = self.selection().cloned();
        self.apply(Operation::SetSelection {
            before,
            after: Some(Selection::new(anchor, Point::new(fpath, flen))),
        });
    }

    /// Replace the link at `(b, i)` with its children.
    fn unwrap_link(&mut self, b: usize, i: usize) {
        let Inline::Link(link) = self.document().block(b).inlines[i].clone() else {
            panic!("expected a link at block {b}, inline {i}")
        };
        self.apply(Operation::RemoveNode {
            path: Path::inline(b, i),
            node: Node::Inline(Inline::Link(link.clone())),
        });
        for (k, child) in link.children.iter().enumerate() {
            self.apply(Operation::InsertNode {
                path: Path::inline(b, i + k),
                node: Node::Inline(Inline::Text(child.clone())),
            });
        }
    }

    // --- Enter / Backspace boundary policies ----------------------------

    /// The Enter gesture: split the block at the caret. At the end of a
    /// heading the new block becomes a paragraph; in an empty list item
    /// the item itself becomes a paragraph instead of splitting.
    pub fn insert_break(&mut self) {
        let Some(sel) = self.selection().cloned() else {
            return;
        };

        self.batch(|ed| {
            if !sel.is_collapsed() {
                ed.delete_selection();
            }
            let Some(caret) = ed.caret() else {
                return;
            };
            let b = caret.path.block_index();
            let block = ed.document().block(b).clone();

            if block.kind.is_list() && block.is_empty() {
                ed.convert_list_item_to_paragraph(b);
                return;
            }

            if ed.at_block_start(&caret) {
                // New empty block above; the caret stays in the original
                // block, which shifts down by one.
                ed.apply(Operation::InsertNode {
                    path: Path::block(b),
                    node: Node::Block(Block::new(block.kind, block.indent)),
                });
                let mut path = caret.path.clone();
                path.0[0] += 1;
                let before = ed.selection().cloned();
                ed.apply(Operation::SetSelection {
                    before,
                    after: Some(Selection::caret(Point::new(path, caret.offset))),
                });
            } else if ed.at_block_end(&caret) {
                // Headings are single-line: the block after one is a
                // paragraph.
                let kind = match block.kind {
                    BlockKind::Heading1 | BlockKind::Heading2 => BlockKind::Paragraph,
                    other => other,
                };
                ed.apply(Operation::InsertNode {
                    path: Path::block(b + 1),
                    node: Node::Block(Block::new(kind, block.indent)),
                });
                let before = ed.selection().cloned();
                ed.apply(Operation::SetSelection {
                    before,
                    after: Some(Selection::caret(Point::new(Path::inline(b + 1, 0), 0))),
                });
            } else {
                let at = ed.caret_inline_boundary(&caret);
                ed.apply(Operation::SplitNode {
                    path: Path::block(b),
                    position: at,
                });
                let first = ed.first_run_path(b + 1, 0);
                let before = ed.selection().cloned();
                ed.apply(Operation::SetSelection {
                    before,
                    after: Some(Selection::caret(Point::new(first, 0))),
                });
            }
        });
    }

    /// The Backspace gesture: delete the selected range, or one
    /// character before the caret. At the start of an empty list item
    /// the item becomes a paragraph; at the start of any other block the
    /// block merges into its predecessor.
    pub fn delete_backward(&mut self) {
        let Some(sel) = self.selection().cloned() else {
            return;
        };

        if !sel.is_collapsed() {
            self.batch(|ed| ed.delete_selection());
            return;
        }

        let caret = sel.anchor.clone();
        let b = caret.path.block_index();
        let block = self.document().block(b).clone();

        if self.at_block_start(&caret) {
            if block.kind.is_list() && block.is_empty() {
                self.convert_list_item_to_paragraph(b);
                return;
            }
            if b == 0 {
                return;
            }
            self.batch(|ed| {
                let prev_len = ed.document().block(b - 1).inlines.len();
                ed.apply(Operation::MergeNode {
                    path: Path::block(b),
                    position: prev_len,
                });
                let junction = ed.first_run_path(b - 1, prev_len);
                let before = ed.selection().cloned();
                ed.apply(Operation::SetSelection {
                    before,
                    after: Some(Selection::caret(Point::new(junction, 0))),
                });
            });
            return;
        }

        self.batch(|ed| {
            let (path, offset) = if caret.offset > 0 {
                (caret.path.clone(), caret.offset)
            } else {
                // Start of a run, but not of the block: step back to the
                // nearest preceding non-empty run.
                let mut at = caret.path.clone();
                loop {
                    let (prev, len) = ed
                        .prev_run_path(&at)
                        .expect("caret is not at block start");
                    if len > 0 {
                        break (prev, len);
                    }
                    if ed.at_block_start(&Point::new(prev.clone(), 0)) {
                        return;
                    }
                    at = prev;
                }
            };

            let run = ed.document().text_at(&path);
            let ch: String = run
                .text
                .chars()
                .nth(offset - 1)
                .expect("offset within run")
                .to_string();
            ed.apply(Operation::RemoveText {
                path: path.clone(),
                offset: offset - 1,
                text: ch,
            });
            let before = ed.selection().cloned();
            ed.apply(Operation::SetSelection {
                before,
                after: Some(Selection::caret(Point::new(path, offset - 1))),
            });
        });
    }

    /// Insert text at the caret, deleting the selected range first. A
    /// single space completing a list token at the start of an otherwise
    /// empty paragraph triggers the auto-list conversion.
    pub fn insert_text(&mut self, text: &str) {
        let Some(sel) = self.selection().cloned() else {
            return;
        };

        if sel.is_collapsed() && text == " " {
            if let Some((kind, token)) = self.auto_list_candidate(&sel.anchor) {
                self.auto_convert_list(&sel.anchor, kind, &token);
                return;
            }
        }

        self.batch(|ed| {
            if !sel.is_collapsed() {
                ed.delete_selection();
            }
            let Some(caret) = ed.caret() else {
                return;
            };
            ed.apply(Operation::InsertText {
                path: caret.path.clone(),
                offset: caret.offset,
                text: text.to_string(),
            });
            let before = ed.selection().cloned();
            ed.apply(Operation::SetSelection {
                before,
                after: Some(Selection::caret(Point::new(
                    caret.path.clone(),
                    caret.offset + text.chars().count(),
                ))),
            });
        });
    }

    /// Convert an empty list item back to a paragraph as one undoable
    /// step. The forced list minimum drops away (indent 1 becomes 0);
    /// a deeper, user-chosen indent is kept.
    fn convert_list_item_to_paragraph(&mut self, b: usize) {
        let block = self.document().block(b).clone();
        let indent = if block.indent == 1 { 0 } else { block.indent };
        self.apply(Operation::SetNodeProperties {
            path: Path::block(b),
            before: NodeProps {
                kind: Some(block.kind),
                indent: Some(block.indent),
                ..NodeProps::default()
            },
            after: NodeProps {
                kind: Some(BlockKind::Paragraph),
                indent: Some(indent),
                ..NodeProps::default()
            },
        });
    }

    fn auto_list_candidate(&self, caret: &Point) -> Option<(BlockKind, String)> {
        let b = caret.path.block_index();
        let block = self.document().block(b);
        if block.kind != BlockKind::Paragraph {
            return None;
        }
        let token = block.text();
        let kind = parse_list_token(&token)?;
        // The token must be the whole block, with the caret right after it.
        if caret.path != Path::inline(b, 0) || caret.offset != token.chars().count() {
            return None;
        }
        Some((kind, token))
    }

    /// The two-state auto-list conversion: the typed space lands in its
    /// own sealed history state, then the token is consumed and the
    /// block reformatted in a second one, so undo steps back to the
    /// literal typed text before reverting the conversion.
    fn auto_convert_list(&mut self, caret: &Point, kind: BlockKind, token: &str) {
        let b = caret.path.block_index();
        debug!("auto-list conversion of block {b} to {:?}", kind);

        let after_space = Point::new(caret.path.clone(), caret.offset + 1);
        self.isolate(|ed| {
            let before = ed.selection().cloned();
            ed.apply(Operation::InsertText {
                path: caret.path.clone(),
                offset: caret.offset,
                text: " ".to_string(),
            });
            ed.apply(Operation::SetSelection {
                before,
                after: Some(Selection::caret(after_space.clone())),
            });
        });

        let block = self.document().block(b).clone();
        let indent = (block.indent + 1).min(MAX_INDENT);
        self.isolate(|ed| {
            ed.apply(Operation::RemoveText {
                path: caret.path.clone(),
                offset: 0,
                text: format!("{token} "),
            });
            ed.apply(Operation::SetNodeProperties {
                path: Path::block(b),
                before: NodeProps {
                    kind: Some(block.kind),
                    indent: Some(block.indent),
                    ..NodeProps::default()
                },
                after: NodeProps {
                    kind: Some(kind),
                    indent: Some(indent),
                    ..NodeProps::default()
                },
            });
            let before = ed.selection().cloned();
            ed.apply(Operation::SetSelection {
                before,
                after: Some(Selection::caret(Point::new(caret.path.clone(), 0))),
            });
        });
    }

    // --- toolbar queries ------------------------------------------------

    /// True if any selected block can be indented further.
    pub fn can_indent(&self) -> bool {
        self.selected_block_range().is_some_and(|(start, end)| {
            (start..=end).any(|b| self.document().block(b).indent < MAX_INDENT)
        })
    }

    /// True if any selected block can be unindented further.
    pub fn can_unindent(&self) -> bool {
        self.selected_block_range().is_some_and(|(start, end)| {
            (start..=end).any(|b| {
                let block = self.document().block(b);
                block.indent > block.kind.min_indent()
            })
        })
    }

    /// True if any selected block has the given kind.
    pub fn is_block_active(&self, kind: BlockKind) -> bool {
        self.selected_block_range().is_some_and(|(start, end)| {
            (start..=end).any(|b| self.document().block(b).kind == kind)
        })
    }

    /// True if the selection touches a link.
    pub fn is_link_active(&self) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        if sel.is_collapsed() {
            return sel.anchor.path.depth() == 3;
        }
        self.run_paths_between(&sel.start().path, &sel.end().path)
            .iter()
            .any(|p| p.depth() == 3)
    }

    /// True if every non-empty text run the selection touches carries
    /// the mark.
    pub fn is_mark_active(&self, mark: Mark) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        if sel.is_collapsed() {
            let run = self.document().text_at(&sel.anchor.path);
            return run.len_chars() > 0 && run.mark(mark);
        }
        let runs: Vec<Path> = self
            .run_paths_between(&sel.start().path, &sel.end().path)
            .into_iter()
            .filter(|p| self.run_len(p) > 0)
            .collect();
        !runs.is_empty() && runs.iter().all(|p| self.document().text_at(p).mark(mark))
    }

    // --- selection plumbing ---------------------------------------------

    fn selected_block_range(&self) -> Option<(usize, usize)> {
        self.selection().map(Selection::block_range)
    }

    fn caret(&self) -> Option<Point> {
        let sel = self.selection()?;
        sel.is_collapsed().then(|| sel.anchor.clone())
    }

    fn run_len(&self, path: &Path) -> usize {
        self.document().text_at(path).len_chars()
    }

    fn link_children_len(&self, b: usize, i: usize) -> usize {
        match &self.document().block(b).inlines[i] {
            Inline::Link(link) => link.children.len(),
            Inline::Text(_) => panic!("inline at block {b}, index {i} is not a link"),
        }
    }

    /// Path of the first text run of an inline (into the link when the
    /// inline is one).
    fn first_run_path(&self, b: usize, i: usize) -> Path {
        match &self.document().block(b).inlines[i] {
            Inline::Text(_) => Path::inline(b, i),
            Inline::Link(_) => Path::link_child(b, i, 0),
        }
    }

    fn last_run_path(&self, b: usize, i: usize) -> Path {
        match &self.document().block(b).inlines[i] {
            Inline::Text(_) => Path::inline(b, i),
            Inline::Link(link) => Path::link_child(b, i, link.children.len() - 1),
        }
    }

    fn at_block_start(&self, point: &Point) -> bool {
        if point.offset != 0 {
            return false;
        }
        match *point.path.0.as_slice() {
            [_, i] => i == 0,
            [_, i, c] => i == 0 && c == 0,
            _ => false,
        }
    }

    fn at_block_end(&self, point: &Point) -> bool {
        let b = point.path.block_index();
        let last = self.document().block(b).inlines.len() - 1;
        let last_run = self.last_run_path(b, last);
        point.path == last_run && point.offset == self.run_len(&last_run)
    }

    /// Previous text run within the same block, with its length.
    fn prev_run_path(&self, path: &Path) -> Option<(Path, usize)> {
        let prev = match *path.0.as_slice() {
            [b, i] if i > 0 => self.last_run_path(b, i - 1),
            [b, i, c] if c > 0 => Path::link_child(b, i, c - 1),
            [b, i, _] if i > 0 => self.last_run_path(b, i - 1),
            _ => return None,
        };
        let len = self.run_len(&prev);
        Some((prev, len))
    }

    /// All text run paths between two run paths, inclusive on both ends.
    fn run_paths_between(&self, lo: &Path, hi: &Path) -> Vec<Path> {
        let doc = self.document();
        let last_block = hi.block_index().min(doc.blocks.len() - 1);
        let mut out = Vec::new();
        for b in lo.block_index()..=last_block {
            for (i, inline) in doc.blocks[b].inlines.iter().enumerate() {
                match inline {
                    Inline::Text(_) => {
                        let p = Path::inline(b, i);
                        if &p >= lo && &p <= hi {
                            out.push(p);
                        }
                    }
                    Inline::Link(link) => {
                        for c in 0..link.children.len() {
                            let p = Path::link_child(b, i, c);
                            if &p >= lo && &p <= hi {
                                out.push(p);
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Resolve the caret to an inline boundary inside its block,
    /// splitting the run (and enclosing link) as needed. The returned
    /// index is a valid block split position.
    fn caret_inline_boundary(&mut self, caret: &Point) -> usize {
        match *caret.path.0.as_slice() {
            [_, i] => {
                let len = self.run_len(&caret.path);
                if caret.offset == 0 {
                    i
                } else {
                    if caret.offset < len {
                        self.apply(Operation::SplitNode {
                            path: caret.path.clone(),
                            position: caret.offset,
                        });
                    }
                    i + 1
                }
            }
            [b, i, c] => {
                let len = self.run_len(&caret.path);
                let child = if caret.offset == 0 {
                    c
                } else if caret.offset == len {
                    c + 1
                } else {
                    self.apply(Operation::SplitNode {
                        path: caret.path.clone(),
                        position: caret.offset,
                    });
                    c + 1
                };
                let children = self.link_children_len(b, i);
                if child == 0 {
                    i
                } else if child == children {
                    i + 1
                } else {
                    self.apply(Operation::SplitNode {
                        path: Path::inline(b, i),
                        position: child,
                    });
                    i + 1
                }
            }
            _ => panic!("caret path {:?} does not address a text run", caret.path),
        }
    }

    /// Split partially covered text runs at the selection boundary and
    /// return the covered run paths. The selection is normalized to
    /// span exactly those runs. Links are not split; covered runs inside
    /// them are returned as link-child paths.
    fn split_run_boundaries(&mut self) -> Vec<Path> {
        let Some(sel) = self.selection().cloned() else {
            return Vec::new();
        };
        if sel.is_collapsed() {
            return Vec::new();
        }
        let start = sel.start().clone();
        let end = sel.end().clone();

        // End boundary first so start-side indices stay stable.
        let mut cov_end = end.path.clone();
        let end_inclusive = end.offset > 0;
        if end.offset > 0 && end.offset < self.run_len(&end.path) {
            self.apply(Operation::SplitNode {
                path: end.path.clone(),
                position: end.offset,
            });
        }

        let cov_start = if start.offset == 0 {
            start.path.clone()
        } else {
            if start.offset < self.run_len(&start.path) {
                self.apply(Operation::SplitNode {
                    path: start.path.clone(),
                    position: start.offset,
                });
                shift_after_split(&mut cov_end, &start.path);
            }
            start.path.next_sibling()
        };

        let runs: Vec<Path> = self
            .run_paths_between(&cov_start, &cov_end)
            .into_iter()
            .filter(|p| end_inclusive || p < &cov_end)
            .collect();

        if let (Some(first), Some(last)) = (runs.first(), runs.last()) {
            let anchor = Point::new(first.clone(), 0);
            let focus = Point::new(last.clone(), self.run_len(last));
            let before = self.selection().cloned();
            self.apply(Operation::SetSelection {
                before,
                after: Some(Selection::new(anchor, focus)),
            });
        }
        runs
    }

    /// Split partially covered runs *and links* at the selection
    /// boundary, so the selection covers whole inlines. Returns the
    /// inline-level coverage and normalizes the selection to it.
    fn split_inline_boundaries(&mut self) -> Option<InlineCoverage> {
        let sel = self.selection()?.clone();
        if sel.is_collapsed() {
            return None;
        }
        let start = sel.start().clone();
        let end = sel.end().clone();

        // End boundary first so start-side indices stay stable.
        let (eb, mut ei) = match *end.path.0.as_slice() {
            [b, i] => {
                if end.offset == 0 {
                    (b, i)
                } else {
                    if end.offset < self.run_len(&end.path) {
                        self.apply(Operation::SplitNode {
                            path: end.path.clone(),
                            position: end.offset,
                        });
                    }
                    (b, i + 1)
                }
            }
            [b, i, c] => {
                let len = self.run_len(&end.path);
                let child_end = if end.offset == 0 {
                    c
                } else if end.offset == len {
                    c + 1
                } else {
                    self.apply(Operation::SplitNode {
                        path: end.path.clone(),
                        position: end.offset,
                    });
                    c + 1
                };
                if child_end == 0 {
                    (b, i)
                } else {
                    if child_end < self.link_children_len(b, i) {
                        self.apply(Operation::SplitNode {
                            path: Path::inline(b, i),
                            position: child_end,
                        });
                    }
                    (b, i + 1)
                }
            }
            _ => panic!("selection path {:?} does not address a text run", end.path),
        };

        let (sb, si) = match *start.path.0.as_slice() {
            [b, i] => {
                if start.offset == 0 {
                    (b, i)
                } else {
                    if start.offset < self.run_len(&start.path) {
                        self.apply(Operation::SplitNode {
                            path: start.path.clone(),
                            position: start.offset,
                        });
                        if eb == b {
                            ei += 1;
                        }
                    }
                    (b, i + 1)
                }
            }
            [b, i, c] => {
                let len = self.run_len(&start.path);
                let child_start = if start.offset == 0 {
                    c
                } else if start.offset == len {
                    c + 1
                } else {
                    self.apply(Operation::SplitNode {
                        path: start.path.clone(),
                        position: start.offset,
                    });
                    c + 1
                };
                if child_start == 0 {
                    (b, i)
                } else if child_start >= self.link_children_len(b, i) {
                    (b, i + 1)
                } else {
                    self.apply(Operation::SplitNode {
                        path: Path::inline(b, i),
                        position: child_start,
                    });
                    if eb == b {
                        ei += 1;
                    }
                    (b, i + 1)
                }
            }
            _ => panic!("selection path {:?} does not address a text run", start.path),
        };

        let cov = InlineCoverage {
            start_block: sb,
            start_inline: si,
            end_block: eb,
            end_inline: ei,
        };

        if !self.coverage_is_empty(&cov) {
            let (fb, fi) = self.coverage_first(&cov);
            let anchor = Point::new(self.first_run_path(fb, fi), 0);
            let (lb, li) = self.coverage_last(&cov);
            let fpath = self.last_run_path(lb, li);
            let flen = self.run_len(&fpath);
            let before = self.selection().cloned();
            self.apply(Operation::SetSelection {
                before,
                after: Some(Selection::new(anchor, Point::new(fpath, flen))),
            });
        }
        Some(cov)
    }

    fn coverage_is_empty(&self, cov: &InlineCoverage) -> bool {
        if cov.start_block == cov.end_block {
            return cov.start_inline >= cov.end_inline;
        }
        let start_len = self.document().block(cov.start_block).inlines.len();
        cov.end_block == cov.start_block + 1 && cov.start_inline >= start_len && cov.end_inline == 0
    }

    fn coverage_first(&self, cov: &InlineCoverage) -> (usize, usize) {
        let start_len = self.document().block(cov.start_block).inlines.len();
        if cov.start_inline < start_len {
            (cov.start_block, cov.start_inline)
        } else {
            (cov.start_block + 1, 0)
        }
    }

    fn coverage_last(&self, cov: &InlineCoverage) -> (usize, usize) {
        if cov.end_inline > 0 {
            (cov.end_block, cov.end_inline - 1)
        } else {
            let blk = cov.end_block - 1;
            (blk, self.document().block(blk).inlines.len() - 1)
        }
    }

    /// Delete the selected range, leaving a collapsed caret at the
    /// deletion point. Must run inside an open batch.
    fn delete_selection(&mut self) {
        let Some(cov) = self.split_inline_boundaries() else {
            return;
        };
        let sb = cov.start_block;
        let eb = cov.end_block;

        if sb == eb {
            for i in (cov.start_inline..cov.end_inline).rev() {
                self.remove_inline(sb, i);
            }
        } else {
            for i in (0..cov.end_inline).rev() {
                self.remove_inline(eb, i);
            }
            for blk in (sb + 1..eb).rev() {
                self.remove_block(blk);
            }
            let start_len = self.document().block(sb).inlines.len();
            for i in (cov.start_inline..start_len).rev() {
                self.remove_inline(sb, i);
            }
            // The end block's remainder joins the start block.
            self.apply(Operation::MergeNode {
                path: Path::block(sb + 1),
                position: cov.start_inline,
            });
        }

        if self.document().block(sb).inlines.is_empty() {
            self.apply(Operation::InsertNode {
                path: Path::inline(sb, 0),
                node: Node::Inline(Inline::empty_text()),
            });
        }

        let caret = if cov.start_inline > 0 {
            let path = self.last_run_path(sb, cov.start_inline - 1);
            let len = self.run_len(&path);
            Point::new(path, len)
        } else {
            Point::new(self.first_run_path(sb, 0), 0)
        };
        let before = self.selection().cloned();
        self.apply(Operation::SetSelection {
            before,
            after: Some(Selection::caret(caret)),
        });
    }

    fn remove_inline(&mut self, b: usize, i: usize) {
        let node = Node::Inline(self.document().block(b).inlines[i].clone());
        self.apply(Operation::RemoveNode {
            path: Path::inline(b, i),
            node,
        });
    }

    fn remove_block(&mut self, b: usize) {
        let node = Node::Block(self.document().block(b).clone());
        self.apply(Operation::RemoveNode {
            path: Path::block(b),
            node,
        });
    }
}

fn set_mark_prop(props: &mut NodeProps, mark: Mark, value: bool) {
    match mark {
        Mark::Bold => props.bold = Some(value),
        Mark::Italic => props.italic = Some(value),
        Mark::Underline => props.underline = Some(value),
        Mark::Strikethrough => props.strikethrough = Some(value),
        Mark::Subscript => props.subscript = Some(value),
        Mark::Superscript => props.superscript = Some(value),
    }
}

/// Shift a covered path right when a split inserted a sibling before it.
fn shift_after_split(cov: &mut Path, split: &Path) {
    let d = split.depth();
    if cov.depth() >= d && cov.0[..d - 1] == split.0[..d - 1] && cov.0[d - 1] >= split.0[d - 1] {
        cov.0[d - 1] += 1;
    }
}

/// Recognize a markdown-style list token: `-`, `*`, `+`, or digits
/// followed by `.` or `)`.
fn parse_list_token(text: &str) -> Option<BlockKind> {
    match text {
        "-" | "*" | "+" => Some(BlockKind::UnorderedListItem),
        _ => {
            let digits = text.strip_suffix('.').or_else(|| text.strip_suffix(')'))?;
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                Some(BlockKind::OrderedListItem)
            } else {
                None
            }
        }
    }
}
