//! Low-level edit operations.
//!
//! Every mutation of the document is expressed as an [`Operation`] so the
//! history engine can record it and replay its inverse. Each operation
//! carries enough data to make its inverse deterministic (a removal keeps
//! the removed content, a merge keeps the pre-merge length).

use crate::doc::{Block, BlockKind, Document, FormattedText, Inline, Link, LinkTarget, Path};
use crate::selection::Selection;

/// A block or inline value carried by node insertion/removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Block(Block),
    Inline(Inline),
}

/// Partial property set for [`Operation::SetNodeProperties`].
///
/// Only the fields relevant to the addressed node are applied: kind and
/// indent on blocks, target on links, marks on text runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeProps {
    pub kind: Option<BlockKind>,
    pub indent: Option<u8>,
    pub target: Option<LinkTarget>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub subscript: Option<bool>,
    pub superscript: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Insert `text` into the text run at `path`, at character `offset`.
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    /// Remove `text` from the text run at `path`, starting at `offset`.
    RemoveText {
        path: Path,
        offset: usize,
        text: String,
    },
    /// Insert `node` at `path`.
    InsertNode { path: Path, node: Node },
    /// Remove the node at `path`; `node` is what currently sits there.
    RemoveNode { path: Path, node: Node },
    /// Change properties of the node at `path`. `before` holds the prior
    /// values of exactly the fields set in `after`.
    SetNodeProperties {
        path: Path,
        before: NodeProps,
        after: NodeProps,
    },
    /// Split the node at `path` at `position` (a character offset for
    /// text runs, a child index otherwise). The tail becomes the next
    /// sibling.
    SplitNode { path: Path, position: usize },
    /// Merge the node at `path` into its previous sibling. `position` is
    /// the previous sibling's length before the merge.
    MergeNode { path: Path, position: usize },
    /// Replace the selection. `None` on either side means no selection.
    SetSelection {
        before: Option<Selection>,
        after: Option<Selection>,
    },
}

impl Operation {
    pub fn is_selection(&self) -> bool {
        matches!(self, Operation::SetSelection { .. })
    }

    /// The operation that exactly undoes this one.
    pub fn inverse(&self) -> Operation {
        match self {
            Operation::InsertText { path, offset, text } => Operation::RemoveText {
                path: path.clone(),
                offset: *offset,
                text: text.clone(),
            },
            Operation::RemoveText { path, offset, text } => Operation::InsertText {
                path: path.clone(),
                offset: *offset,
                text: text.clone(),
            },
            Operation::InsertNode { path, node } => Operation::RemoveNode {
                path: path.clone(),
                node: node.clone(),
            },
            Operation::RemoveNode { path, node } => Operation::InsertNode {
                path: path.clone(),
                node: node.clone(),
            },
            Operation::SetNodeProperties {
                path,
                before,
                after,
            } => Operation::SetNodeProperties {
                path: path.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            Operation::SplitNode { path, position } => Operation::MergeNode {
                path: path.next_sibling(),
                position: *position,
            },
            Operation::MergeNode { path, position } => Operation::SplitNode {
                path: path.prev_sibling(),
                position: *position,
            },
            Operation::SetSelection { before, after } => Operation::SetSelection {
                before: after.clone(),
                after: before.clone(),
            },
        }
    }

    /// Apply the operation to the document and selection. Unresolvable
    /// paths panic: they indicate the caller issued operations against a
    /// stale document snapshot.
    pub fn apply(&self, doc: &mut Document, selection: &mut Option<Selection>) {
        match self {
            Operation::InsertText { path, offset, text } => {
                let run = doc.text_at_mut(path);
                let at = byte_index(&run.text, *offset);
                run.text.insert_str(at, text);
            }
            Operation::RemoveText { path, offset, text } => {
                let run = doc.text_at_mut(path);
                let start = byte_index(&run.text, *offset);
                let end = byte_index(&run.text, *offset + text.chars().count());
                assert_eq!(
                    &run.text[start..end],
                    text,
                    "RemoveText at {path:?} does not match the document"
                );
                run.text.replace_range(start..end, "");
            }
            Operation::InsertNode { path, node } => insert_node(doc, path, node.clone()),
            Operation::RemoveNode { path, node } => {
                let removed = remove_node(doc, path);
                assert_eq!(
                    &removed, node,
                    "RemoveNode at {path:?} does not match the document"
                );
            }
            Operation::SetNodeProperties { path, after, .. } => set_props(doc, path, after),
            Operation::SplitNode { path, position } => split_node(doc, path, *position),
            Operation::MergeNode { path, position } => merge_node(doc, path, *position),
            Operation::SetSelection { after, .. } => {
                *selection = after.clone();
            }
        }
    }
}

/// Byte index of the `char_offset`-th character of `s`. The offset one
/// past the last character maps to `s.len()`.
pub(crate) fn byte_index(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(char_offset)
        .unwrap_or_else(|| panic!("offset {char_offset} beyond text of {} chars", s.chars().count()))
}

fn insert_node(doc: &mut Document, path: &Path, node: Node) {
    match (path.0.as_slice(), node) {
        ([b], Node::Block(block)) => {
            assert!(*b <= doc.blocks.len(), "unresolvable path {:?}", path);
            doc.blocks.insert(*b, block);
        }
        ([b, i], Node::Inline(inline)) => {
            let inlines = &mut doc.block_mut(*b).inlines;
            assert!(*i <= inlines.len(), "unresolvable path {:?}", path);
            inlines.insert(*i, inline);
        }
        ([b, i, c], Node::Inline(Inline::Text(run))) => match &mut doc.block_mut(*b).inlines[*i] {
            Inline::Link(link) => {
                assert!(*c <= link.children.len(), "unresolvable path {:?}", path);
                link.children.insert(*c, run);
            }
            Inline::Text(_) => panic!("path {:?} descends into a text run", path),
        },
        ([_, _, _], Node::Inline(Inline::Link(_))) => {
            panic!("links cannot nest: refusing to insert a link at {:?}", path)
        }
        (_, _) => panic!("node shape does not fit path {:?}", path),
    }
}

fn remove_node(doc: &mut Document, path: &Path) -> Node {
    match path.0.as_slice() {
        [b] => {
            assert!(*b < doc.blocks.len(), "unresolvable path {:?}", path);
            Node::Block(doc.blocks.remove(*b))
        }
        [b, i] => {
            let inlines = &mut doc.block_mut(*b).inlines;
            assert!(*i < inlines.len(), "unresolvable path {:?}", path);
            Node::Inline(inlines.remove(*i))
        }
        [b, i, c] => match &mut doc.block_mut(*b).inlines[*i] {
            Inline::Link(link) => {
                assert!(*c < link.children.len(), "unresolvable path {:?}", path);
                Node::Inline(Inline::Text(link.children.remove(*c)))
            }
            Inline::Text(_) => panic!("path {:?} descends into a text run", path),
        },
        _ => panic!("unresolvable path {:?}", path),
    }
}

fn set_props(doc: &mut Document, path: &Path, props: &NodeProps) {
    match path.0.as_slice() {
        [b] => {
            let block = doc.block_mut(*b);
            if let Some(kind) = props.kind {
                block.kind = kind;
            }
            if let Some(indent) = props.indent {
                block.indent = indent;
            }
        }
        [b, i] => match &mut doc.block_mut(*b).inlines[*i] {
            Inline::Text(run) => set_marks(run, props),
            Inline::Link(link) => {
                if let Some(target) = &props.target {
                    link.target = target.clone();
                }
            }
        },
        [b, i, c] => match &mut doc.block_mut(*b).inlines[*i] {
            Inline::Link(link) => set_marks(&mut link.children[*c], props),
            Inline::Text(_) => panic!("path {:?} descends into a text run", path),
        },
        _ => panic!("unresolvable path {:?}", path),
    }
}

fn set_marks(run: &mut FormattedText, props: &NodeProps) {
    if let Some(v) = props.bold {
        run.bold = v;
    }
    if let Some(v) = props.italic {
        run.italic = v;
    }
    if let Some(v) = props.underline {
        run.underline = v;
    }
    if let Some(v) = props.strikethrough {
        run.strikethrough = v;
    }
    if let Some(v) = props.subscript {
        run.subscript = v;
    }
    if let Some(v) = props.superscript {
        run.superscript = v;
    }
}

fn split_node(doc: &mut Document, path: &Path, position: usize) {
    match path.0.as_slice() {
        [b] => {
            let block = doc.block_mut(*b);
            assert!(position <= block.inlines.len(), "split beyond block {b}");
            let tail_inlines = block.inlines.split_off(position);
            let tail = Block {
                kind: block.kind,
                indent: block.indent,
                inlines: tail_inlines,
            };
            doc.blocks.insert(*b + 1, tail);
        }
        [b, i] => {
            let inlines = &mut doc.block_mut(*b).inlines;
            let tail = match &mut inlines[*i] {
                Inline::Text(run) => {
                    let at = byte_index(&run.text, position);
                    let rest = run.text.split_off(at);
                    let mut tail = run.clone();
                    tail.text = rest;
                    Inline::Text(tail)
                }
                Inline::Link(link) => {
                    assert!(position <= link.children.len(), "split beyond link {path:?}");
                    let rest = link.children.split_off(position);
                    Inline::Link(Link {
                        target: link.target.clone(),
                        children: rest,
                    })
                }
            };
            inlines.insert(*i + 1, tail);
        }
        [b, i, c] => match &mut doc.block_mut(*b).inlines[*i] {
            Inline::Link(link) => {
                let run = &mut link.children[*c];
                let at = byte_index(&run.text, position);
                let rest = run.text.split_off(at);
                let mut tail = run.clone();
                tail.text = rest;
                link.children.insert(*c + 1, tail);
            }
            Inline::Text(_) => panic!("path {:?} descends into a text run", path),
        },
        _ => panic!("unresolvable path {:?}", path),
    }
}

fn merge_node(doc: &mut Document, path: &Path, position: usize) {
    assert!(path.last() > 0, "node at {:?} has no previous sibling", path);
    match path.0.as_slice() {
        [b] => {
            let removed = doc.blocks.remove(*b);
            let prev = doc.block_mut(*b - 1);
            assert_eq!(prev.inlines.len(), position, "merge position mismatch at {path:?}");
            prev.inlines.extend(removed.inlines);
        }
        [b, i] => {
            let inlines = &mut doc.block_mut(*b).inlines;
            let removed = inlines.remove(*i);
            match (&mut inlines[*i - 1], removed) {
                (Inline::Text(prev), Inline::Text(run)) => {
                    assert_eq!(prev.len_chars(), position, "merge position mismatch at {path:?}");
                    prev.text.push_str(&run.text);
                }
                (Inline::Link(prev), Inline::Link(link)) => {
                    assert_eq!(prev.children.len(), position, "merge position mismatch at {path:?}");
                    prev.children.extend(link.children);
                }
                _ => panic!("cannot merge mismatched inlines at {:?}", path),
            }
        }
        [b, i, c] => match &mut doc.block_mut(*b).inlines[*i] {
            Inline::Link(link) => {
                let removed = link.children.remove(*c);
                let prev = &mut link.children[*c - 1];
                assert_eq!(prev.len_chars(), position, "merge position mismatch at {path:?}");
                prev.text.push_str(&removed.text);
            }
            Inline::Text(_) => panic!("path {:?} descends into a text run", path),
        },
        _ => panic!("unresolvable path {:?}", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::FormattedText;

    fn doc_with(text: &str) -> Document {
        let mut doc = Document::new();
        doc.blocks[0].inlines = vec![Inline::Text(FormattedText::plain(text))];
        doc
    }

    fn apply(doc: &mut Document, op: &Operation) {
        let mut selection = None;
        op.apply(doc, &mut selection);
    }

    #[test]
    fn insert_then_inverse_restores_document() {
        let mut doc = doc_with("hello");
        let before = doc.clone();
        let op = Operation::InsertText {
            path: Path::inline(0, 0),
            offset: 5,
            text: " world".into(),
        };

        apply(&mut doc, &op);
        assert_eq!(doc.blocks[0].text(), "hello world");

        apply(&mut doc, &op.inverse());
        assert_eq!(doc, before);
    }

    #[test]
    fn remove_text_checks_document_content() {
        let mut doc = doc_with("hello");
        let op = Operation::RemoveText {
            path: Path::inline(0, 0),
            offset: 0,
            text: "he".into(),
        };
        apply(&mut doc, &op);
        assert_eq!(doc.blocks[0].text(), "llo");
    }

    #[test]
    #[should_panic(expected = "does not match the document")]
    fn remove_text_mismatch_panics() {
        let mut doc = doc_with("hello");
        let op = Operation::RemoveText {
            path: Path::inline(0, 0),
            offset: 0,
            text: "xx".into(),
        };
        apply(&mut doc, &op);
    }

    #[test]
    fn split_inverse_is_merge() {
        let mut doc = doc_with("headword");
        let before = doc.clone();
        let split = Operation::SplitNode {
            path: Path::inline(0, 0),
            position: 4,
        };

        apply(&mut doc, &split);
        assert_eq!(doc.blocks[0].inlines.len(), 2);

        apply(&mut doc, &split.inverse());
        assert_eq!(doc, before);
    }

    #[test]
    fn block_split_keeps_kind_and_indent() {
        let mut doc = Document::new();
        doc.blocks[0] = Block {
            kind: BlockKind::UnorderedListItem,
            indent: 2,
            inlines: vec![
                Inline::Text(FormattedText::plain("a")),
                Inline::Text(FormattedText::plain("b")),
            ],
        };

        apply(
            &mut doc,
            &Operation::SplitNode {
                path: Path::block(0),
                position: 1,
            },
        );

        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[1].kind, BlockKind::UnorderedListItem);
        assert_eq!(doc.blocks[1].indent, 2);
        assert_eq!(doc.blocks[1].text(), "b");
    }

    #[test]
    fn set_properties_inverse_restores_block() {
        let mut doc = Document::new();
        let before = doc.clone();
        let op = Operation::SetNodeProperties {
            path: Path::block(0),
            before: NodeProps {
                kind: Some(BlockKind::Paragraph),
                indent: Some(0),
                ..NodeProps::default()
            },
            after: NodeProps {
                kind: Some(BlockKind::Heading1),
                indent: Some(1),
                ..NodeProps::default()
            },
        };

        apply(&mut doc, &op);
        assert_eq!(doc.blocks[0].kind, BlockKind::Heading1);
        assert_eq!(doc.blocks[0].indent, 1);

        apply(&mut doc, &op.inverse());
        assert_eq!(doc, before);
    }

    #[test]
    fn node_insert_remove_inverse() {
        let mut doc = doc_with("x");
        let before = doc.clone();
        let op = Operation::InsertNode {
            path: Path::block(1),
            node: Node::Block(Block::new(BlockKind::Paragraph, 0)),
        };

        apply(&mut doc, &op);
        assert_eq!(doc.blocks.len(), 2);

        apply(&mut doc, &op.inverse());
        assert_eq!(doc, before);
    }

    #[test]
    #[should_panic(expected = "links cannot nest")]
    fn inserting_link_into_link_panics() {
        let mut doc = Document::new();
        doc.blocks[0].inlines = vec![Inline::Link(Link {
            target: LinkTarget::from_url("entry:a"),
            children: vec![FormattedText::plain("a")],
        })];
        let nested = Inline::Link(Link {
            target: LinkTarget::from_url("entry:b"),
            children: vec![FormattedText::plain("b")],
        });
        apply(
            &mut doc,
            &Operation::InsertNode {
                path: Path::link_child(0, 0, 1),
                node: Node::Inline(nested),
            },
        );
    }

    #[test]
    fn multibyte_text_offsets_are_character_based() {
        let mut doc = doc_with("ɛ̃tʁe");
        apply(
            &mut doc,
            &Operation::InsertText {
                path: Path::inline(0, 0),
                offset: 2,
                text: "ˈ".into(),
            },
        );
        assert_eq!(doc.blocks[0].text(), "ɛ̃ˈtʁe");
    }

    #[test]
    fn selection_op_sets_and_inverts() {
        let mut doc = doc_with("abc");
        let mut selection = None;
        let sel = Selection::caret(crate::selection::Point::new(Path::inline(0, 0), 1));
        let op = Operation::SetSelection {
            before: None,
            after: Some(sel.clone()),
        };

        op.apply(&mut doc, &mut selection);
        assert_eq!(selection, Some(sel));

        op.inverse().apply(&mut doc, &mut selection);
        assert_eq!(selection, None);
    }
}
