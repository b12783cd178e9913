//! Nesting reconstructor: derive a hierarchical block/list tree from
//! the flat, indentation-leveled sequence.
//!
//! The tree is re-derived on demand (render or export time) and never
//! stored; the flat sequence stays the single source of truth. One
//! left-to-right scan with a single position of lookahead, no
//! backtracking.

use crate::doc::{Block, BlockKind, Inline};

/// A node of the derived tree. Indents are relative to the parent list
/// item, not absolute document levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NestedBlock {
    Simple {
        kind: BlockKind,
        indent: u8,
        inlines: Vec<Inline>,
    },
    List {
        kind: BlockKind,
        indent: u8,
        items: Vec<ListItem>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub inlines: Vec<Inline>,
    pub children: Vec<NestedBlock>,
}

/// Reconstruct the nested tree of the flat block sequence.
pub fn nest(blocks: &[Block]) -> Vec<NestedBlock> {
    let mut cursor = Cursor { blocks, pos: 0 };
    let mut out = Vec::new();
    while cursor.peek().is_some() {
        out.push(cursor.visit(0));
    }
    out
}

struct Cursor<'a> {
    blocks: &'a [Block],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Block> {
        self.blocks.get(self.pos)
    }

    /// Visit the block at the cursor as a child of `base_level`.
    ///
    /// A list-item block opens a list that keeps consuming following
    /// blocks of the same kind at the same level, which is what merges
    /// visually adjacent items into one list rather than one list per
    /// item.
    fn visit(&mut self, base_level: u8) -> NestedBlock {
        let block = self.peek().expect("cursor advanced past the end");
        let indent = block.indent.saturating_sub(base_level);

        if !block.kind.is_list() {
            self.pos += 1;
            return NestedBlock::Simple {
                kind: block.kind,
                indent,
                inlines: block.inlines.clone(),
            };
        }

        let kind = block.kind;
        let level = block.indent;
        let mut items = vec![self.visit_item(level)];
        while let Some(next) = self.peek() {
            if next.kind != kind || next.indent != level {
                break;
            }
            items.push(self.visit_item(level));
        }
        NestedBlock::List { kind, indent, items }
    }

    /// One list item at `level`: the block's own inlines, then every
    /// following deeper block as a child.
    fn visit_item(&mut self, level: u8) -> ListItem {
        let inlines = self.blocks[self.pos].inlines.clone();
        self.pos += 1;

        let mut children = Vec::new();
        while let Some(next) = self.peek() {
            if next.indent <= level {
                break;
            }
            children.push(self.visit(level + 1));
        }
        ListItem { inlines, children }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::FormattedText;

    fn block(kind: BlockKind, indent: u8, text: &str) -> Block {
        Block {
            kind,
            indent,
            inlines: vec![Inline::Text(FormattedText::plain(text))],
        }
    }

    fn text_of(inlines: &[Inline]) -> String {
        inlines
            .iter()
            .map(|i| match i {
                Inline::Text(t) => t.text.clone(),
                Inline::Link(l) => l.children.iter().map(|c| c.text.clone()).collect(),
            })
            .collect()
    }

    #[test]
    fn empty_sequence_nests_to_nothing() {
        assert_eq!(nest(&[]), Vec::new());
    }

    #[test]
    fn simple_blocks_stay_flat() {
        let blocks = vec![
            block(BlockKind::Heading1, 0, "h"),
            block(BlockKind::Paragraph, 0, "p1"),
            block(BlockKind::Paragraph, 1, "p2"),
        ];
        let nested = nest(&blocks);

        assert_eq!(nested.len(), 3);
        let NestedBlock::Simple { kind, indent, .. } = &nested[2] else {
            panic!("expected a simple block");
        };
        assert_eq!(*kind, BlockKind::Paragraph);
        assert_eq!(*indent, 1);
    }

    #[test]
    fn adjacent_same_kind_items_merge_into_one_list() {
        let blocks = vec![
            block(BlockKind::UnorderedListItem, 1, "a"),
            block(BlockKind::UnorderedListItem, 1, "b"),
            block(BlockKind::UnorderedListItem, 1, "c"),
        ];
        let nested = nest(&blocks);

        assert_eq!(nested.len(), 1);
        let NestedBlock::List { kind, items, .. } = &nested[0] else {
            panic!("expected a list");
        };
        assert_eq!(*kind, BlockKind::UnorderedListItem);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.children.is_empty()));
    }

    #[test]
    fn kind_change_at_same_level_starts_a_new_list() {
        let blocks = vec![
            block(BlockKind::UnorderedListItem, 1, "u"),
            block(BlockKind::OrderedListItem, 1, "o"),
        ];
        let nested = nest(&blocks);

        assert_eq!(nested.len(), 2);
        assert!(matches!(
            &nested[0],
            NestedBlock::List { kind: BlockKind::UnorderedListItem, items, .. } if items.len() == 1
        ));
        assert!(matches!(
            &nested[1],
            NestedBlock::List { kind: BlockKind::OrderedListItem, items, .. } if items.len() == 1
        ));
    }

    #[test]
    fn deeper_blocks_become_item_children() {
        let blocks = vec![
            block(BlockKind::UnorderedListItem, 1, "item"),
            block(BlockKind::Paragraph, 2, "note"),
            block(BlockKind::Paragraph, 3, "sub-note"),
        ];
        let nested = nest(&blocks);

        assert_eq!(nested.len(), 1);
        let NestedBlock::List { items, .. } = &nested[0] else {
            panic!("expected a list");
        };
        assert_eq!(items[0].children.len(), 2);
        // Child indents are relative to the item.
        let NestedBlock::Simple { indent, .. } = &items[0].children[0] else {
            panic!("expected a simple child");
        };
        assert_eq!(*indent, 0);
        let NestedBlock::Simple { indent, .. } = &items[0].children[1] else {
            panic!("expected a simple child");
        };
        assert_eq!(*indent, 1);
    }

    // The canonical regression case: an ordered item whose children are
    // a paragraph and a two-item unordered list (the first item of which
    // has a paragraph child), followed by a sibling ordered item.
    #[test]
    fn mixed_levels_reconstruct_the_reference_tree() {
        let blocks = vec![
            block(BlockKind::OrderedListItem, 0, "o1"),
            block(BlockKind::Paragraph, 1, "p1"),
            block(BlockKind::UnorderedListItem, 1, "u1"),
            block(BlockKind::Paragraph, 2, "p2"),
            block(BlockKind::UnorderedListItem, 1, "u2"),
            block(BlockKind::OrderedListItem, 0, "o2"),
        ];
        let nested = nest(&blocks);

        assert_eq!(nested.len(), 1);
        let NestedBlock::List { kind, items, .. } = &nested[0] else {
            panic!("expected an ordered list");
        };
        assert_eq!(*kind, BlockKind::OrderedListItem);
        assert_eq!(items.len(), 2);

        // First item: one paragraph, then one unordered list.
        let first = &items[0];
        assert_eq!(text_of(&first.inlines), "o1");
        assert_eq!(first.children.len(), 2);

        let NestedBlock::Simple { kind, indent, inlines } = &first.children[0] else {
            panic!("expected a paragraph child");
        };
        assert_eq!(*kind, BlockKind::Paragraph);
        assert_eq!(*indent, 0);
        assert_eq!(text_of(inlines), "p1");

        let NestedBlock::List { kind, items: sub, .. } = &first.children[1] else {
            panic!("expected an unordered list child");
        };
        assert_eq!(*kind, BlockKind::UnorderedListItem);
        assert_eq!(sub.len(), 2);
        assert_eq!(text_of(&sub[0].inlines), "u1");
        assert_eq!(sub[0].children.len(), 1);
        let NestedBlock::Simple { inlines, .. } = &sub[0].children[0] else {
            panic!("expected a paragraph grandchild");
        };
        assert_eq!(text_of(inlines), "p2");
        assert_eq!(text_of(&sub[1].inlines), "u2");
        assert!(sub[1].children.is_empty());

        // Second item is a sibling, not a descendant.
        assert_eq!(text_of(&items[1].inlines), "o2");
        assert!(items[1].children.is_empty());
    }
}
