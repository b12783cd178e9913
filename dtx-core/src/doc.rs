//! Document model: a flat, indentation-leveled sequence of blocks.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path as FsPath;
use thiserror::Error;

use crate::wire;

/// Maximum nesting depth a block can be indented to.
pub const MAX_INDENT: u8 = 8;

/// The kind of a block in the flat sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Paragraph,
    Heading1,
    Heading2,
    OrderedListItem,
    UnorderedListItem,
}

impl BlockKind {
    /// List items carry a forced minimum indent of 1; everything else
    /// may sit at the document root.
    pub fn is_list(&self) -> bool {
        matches!(self, BlockKind::OrderedListItem | BlockKind::UnorderedListItem)
    }

    pub fn min_indent(&self) -> u8 {
        if self.is_list() {
            1
        } else {
            0
        }
    }
}

/// One of the six independent text marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Subscript,
    Superscript,
}

/// A run of text with uniform formatting.
///
/// `subscript` and `superscript` are mutually exclusive, but that is
/// enforced by the formatting operations, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormattedText {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub subscript: bool,
    pub superscript: bool,
}

impl FormattedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn mark(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
            Mark::Strikethrough => self.strikethrough,
            Mark::Subscript => self.subscript,
            Mark::Superscript => self.superscript,
        }
    }

    pub fn set_mark(&mut self, mark: Mark, on: bool) {
        match mark {
            Mark::Bold => self.bold = on,
            Mark::Italic => self.italic = on,
            Mark::Underline => self.underline = on,
            Mark::Strikethrough => self.strikethrough = on,
            Mark::Subscript => self.subscript = on,
            Mark::Superscript => self.superscript = on,
        }
    }

    /// True if both runs carry the same marks (text content ignored).
    pub fn same_marks(&self, other: &Self) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.strikethrough == other.strikethrough
            && self.subscript == other.subscript
            && self.superscript == other.superscript
    }
}

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// External web URL.
    Web,
    /// Cross-reference to another dictionary entry (`entry:` scheme).
    Entry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: String,
    /// Resolved display name; UI-side metadata, dropped on the wire.
    pub title: Option<String>,
    pub kind: LinkKind,
}

impl LinkTarget {
    /// Build a target from a bare URL, deriving the kind from the scheme.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = if url.starts_with("entry:") {
            LinkKind::Entry
        } else {
            LinkKind::Web
        };
        Self {
            url,
            title: None,
            kind,
        }
    }
}

/// A link inline. Children are plain formatted text only; links never
/// nest, and the type makes a nested link unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: LinkTarget,
    pub children: Vec<FormattedText>,
}

/// Inline content within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(FormattedText),
    Link(Link),
}

impl Inline {
    pub fn empty_text() -> Self {
        Inline::Text(FormattedText::default())
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Inline::Link(_))
    }

    /// Total character count of the inline's text content.
    pub fn len_chars(&self) -> usize {
        match self {
            Inline::Text(t) => t.len_chars(),
            Inline::Link(l) => l.children.iter().map(FormattedText::len_chars).sum(),
        }
    }
}

/// One paragraph, heading, or list-item line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Nesting depth in the flat sequence, in `[0, MAX_INDENT]`. Tree
    /// nesting is derived from this (see [`crate::nest`]), never stored.
    pub indent: u8,
    /// Never empty: a content-free block holds a single empty text run.
    pub inlines: Vec<Inline>,
}

impl Block {
    pub fn new(kind: BlockKind, indent: u8) -> Self {
        Self {
            kind,
            indent,
            inlines: vec![Inline::empty_text()],
        }
    }

    /// Concatenated plain text of the block.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for inline in &self.inlines {
            match inline {
                Inline::Text(t) => out.push_str(&t.text),
                Inline::Link(l) => {
                    for child in &l.children {
                        out.push_str(&child.text);
                    }
                }
            }
        }
        out
    }

    pub fn len_chars(&self) -> usize {
        self.inlines.iter().map(Inline::len_chars).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }
}

/// Address of a node in the document.
///
/// Depth 1 addresses a block, depth 2 an inline within a block, depth 3
/// a text run inside a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(pub Vec<usize>);

impl Path {
    pub fn block(b: usize) -> Self {
        Path(vec![b])
    }

    pub fn inline(b: usize, i: usize) -> Self {
        Path(vec![b, i])
    }

    pub fn link_child(b: usize, i: usize, c: usize) -> Self {
        Path(vec![b, i, c])
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Index of the block this path lives in.
    pub fn block_index(&self) -> usize {
        self.0[0]
    }

    pub fn last(&self) -> usize {
        *self.0.last().expect("empty path")
    }

    /// Sibling path with the last component shifted up by one.
    pub fn next_sibling(&self) -> Path {
        let mut p = self.0.clone();
        *p.last_mut().expect("empty path") += 1;
        Path(p)
    }

    pub fn prev_sibling(&self) -> Path {
        let mut p = self.0.clone();
        let last = p.last_mut().expect("empty path");
        assert!(*last > 0, "path {:?} has no previous sibling", self);
        *last -= 1;
        Path(p)
    }
}

/// Structural invariant violations, reported at batch boundaries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
    #[error("list item at block {block} has indent 0")]
    ListItemAtRoot { block: usize },

    #[error("block {block} has indent {indent}, beyond the maximum {MAX_INDENT}")]
    IndentTooDeep { block: usize, indent: u8 },

    #[error("block {block} has no inline content")]
    EmptyBlock { block: usize },

    #[error("link at block {block}, inline {inline} has no children")]
    EmptyLink { block: usize, inline: usize },
}

/// The document: an ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A new document holds a single empty paragraph.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::new(BlockKind::Paragraph, 0)],
        }
    }

    pub fn block(&self, index: usize) -> &Block {
        self.blocks
            .get(index)
            .unwrap_or_else(|| panic!("unresolvable block index {index}"))
    }

    pub fn block_mut(&mut self, index: usize) -> &mut Block {
        self.blocks
            .get_mut(index)
            .unwrap_or_else(|| panic!("unresolvable block index {index}"))
    }

    /// Resolve a path to the text run it addresses. Panics on anything
    /// that is not a text position; an unresolvable path is a caller
    /// error, not a recoverable condition.
    pub fn text_at(&self, path: &Path) -> &FormattedText {
        match path.0.as_slice() {
            [b, i] => match &self.block(*b).inlines[*i] {
                Inline::Text(t) => t,
                Inline::Link(_) => panic!("path {:?} addresses a link, not text", path),
            },
            [b, i, c] => match &self.block(*b).inlines[*i] {
                Inline::Link(l) => &l.children[*c],
                Inline::Text(_) => panic!("path {:?} descends into a text run", path),
            },
            _ => panic!("path {:?} does not address a text run", path),
        }
    }

    pub fn text_at_mut(&mut self, path: &Path) -> &mut FormattedText {
        match path.0.as_slice() {
            [b, i] => match &mut self.block_mut(*b).inlines[*i] {
                Inline::Text(t) => t,
                Inline::Link(_) => panic!("path {:?} addresses a link, not text", path),
            },
            [b, i, c] => match &mut self.block_mut(*b).inlines[*i] {
                Inline::Link(l) => &mut l.children[*c],
                Inline::Text(_) => panic!("path {:?} descends into a text run", path),
            },
            _ => panic!("path {:?} does not address a text run", path),
        }
    }

    /// Check the structural invariants. Called at batch boundaries;
    /// intermediate states inside a batch need not pass.
    pub fn validate(&self) -> Result<(), InvariantError> {
        for (b, block) in self.blocks.iter().enumerate() {
            if block.kind.is_list() && block.indent == 0 {
                return Err(InvariantError::ListItemAtRoot { block: b });
            }
            if block.indent > MAX_INDENT {
                return Err(InvariantError::IndentTooDeep {
                    block: b,
                    indent: block.indent,
                });
            }
            if block.inlines.is_empty() {
                return Err(InvariantError::EmptyBlock { block: b });
            }
            for (i, inline) in block.inlines.iter().enumerate() {
                if let Inline::Link(link) = inline {
                    if link.children.is_empty() {
                        return Err(InvariantError::EmptyLink { block: b, inline: i });
                    }
                }
            }
        }
        Ok(())
    }

    /// Load a document from a wire-format JSON file.
    pub fn load(path: &FsPath) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let blocks: Vec<wire::WireBlock> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse wire JSON: {}", path.display()))?;

        let doc = wire::from_wire(&blocks)
            .with_context(|| format!("Failed to decode document: {}", path.display()))?;

        Ok(doc)
    }

    /// Write the document to a wire-format JSON file.
    pub fn save(&self, path: &FsPath) -> Result<()> {
        let blocks = wire::to_wire(self);
        let json = serde_json::to_string_pretty(&blocks).context("Failed to encode document")?;

        fs::write(path, json)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        Ok(())
    }
}
