//! Wire-format adapters: the serialized block/inline shape exchanged
//! with the backend schema.
//!
//! The shape is bit-exact for interoperability: field names, the five
//! kind tags, and the flag-omission-means-false convention are fixed.
//! Decoding failures are typed and name the offending block/inline
//! index; the caller decides whether to substitute a default document
//! or surface the error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::doc::{
    Block, BlockKind, Document, FormattedText, Inline, Link, LinkTarget, MAX_INDENT,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBlock {
    pub kind: String,
    pub level: u32,
    pub inlines: Vec<WireInline>,
}

/// One wire inline: a text run or a link. The wire schema overlays both
/// shapes on a single object, so the decoder (not the JSON layer)
/// diagnoses an inline that carries neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireInline {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub subscript: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub superscript: bool,
    #[serde(rename = "linkTarget", skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inlines: Option<Vec<WireText>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireText {
    pub text: String,
    #[serde(skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub subscript: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub superscript: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("block {block}: unknown kind tag {kind:?}")]
    UnknownKind { block: usize, kind: String },

    #[error("block {block}, inline {inline}: neither text nor link content")]
    EmptyInline { block: usize, inline: usize },
}

fn kind_tag(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Paragraph => "PARAGRAPH",
        BlockKind::Heading1 => "HEADING_1",
        BlockKind::Heading2 => "HEADING_2",
        BlockKind::OrderedListItem => "OLIST_ITEM",
        BlockKind::UnorderedListItem => "ULIST_ITEM",
    }
}

fn parse_kind(tag: &str) -> Option<BlockKind> {
    match tag {
        "PARAGRAPH" => Some(BlockKind::Paragraph),
        "HEADING_1" => Some(BlockKind::Heading1),
        "HEADING_2" => Some(BlockKind::Heading2),
        "OLIST_ITEM" => Some(BlockKind::OrderedListItem),
        "ULIST_ITEM" => Some(BlockKind::UnorderedListItem),
        _ => None,
    }
}

fn text_to_wire(run: &FormattedText) -> WireText {
    WireText {
        text: run.text.clone(),
        bold: run.bold,
        italic: run.italic,
        underline: run.underline,
        strikethrough: run.strikethrough,
        subscript: run.subscript,
        superscript: run.superscript,
    }
}

fn text_from_wire(wire: &WireText) -> FormattedText {
    FormattedText {
        text: wire.text.clone(),
        bold: wire.bold,
        italic: wire.italic,
        underline: wire.underline,
        strikethrough: wire.strikethrough,
        subscript: wire.subscript,
        superscript: wire.superscript,
    }
}

/// Encode a document for the backend. Link metadata beyond the URL is
/// UI-side and does not cross the wire.
pub fn to_wire(doc: &Document) -> Vec<WireBlock> {
    doc.blocks
        .iter()
        .map(|block| WireBlock {
            kind: kind_tag(block.kind).to_string(),
            level: block.indent as u32,
            inlines: block
                .inlines
                .iter()
                .map(|inline| match inline {
                    Inline::Text(run) => WireInline {
                        text: Some(run.text.clone()),
                        bold: run.bold,
                        italic: run.italic,
                        underline: run.underline,
                        strikethrough: run.strikethrough,
                        subscript: run.subscript,
                        superscript: run.superscript,
                        ..WireInline::default()
                    },
                    Inline::Link(link) => WireInline {
                        link_target: Some(link.target.url.clone()),
                        inlines: Some(link.children.iter().map(text_to_wire).collect()),
                        ..WireInline::default()
                    },
                })
                .collect(),
        })
        .collect()
}

/// Decode wire blocks into a document. An empty sequence decodes to the
/// default document; a block with zero inlines gets a single empty text
/// run; a list item's level is clamped to the forced minimum.
pub fn from_wire(blocks: &[WireBlock]) -> Result<Document, DecodeError> {
    if blocks.is_empty() {
        return Ok(Document::new());
    }

    let mut out = Vec::with_capacity(blocks.len());
    for (b, wire_block) in blocks.iter().enumerate() {
        let kind = parse_kind(&wire_block.kind).ok_or_else(|| DecodeError::UnknownKind {
            block: b,
            kind: wire_block.kind.clone(),
        })?;

        let indent = (wire_block.level.min(MAX_INDENT as u32) as u8).max(kind.min_indent());

        let mut inlines = Vec::with_capacity(wire_block.inlines.len().max(1));
        for (i, wire_inline) in wire_block.inlines.iter().enumerate() {
            if let Some(url) = &wire_inline.link_target {
                let children: Vec<FormattedText> = match &wire_inline.inlines {
                    Some(texts) if !texts.is_empty() => {
                        texts.iter().map(text_from_wire).collect()
                    }
                    _ => vec![FormattedText::default()],
                };
                inlines.push(Inline::Link(Link {
                    target: LinkTarget::from_url(url.clone()),
                    children,
                }));
            } else if wire_inline.text.is_some() {
                inlines.push(Inline::Text(text_from_wire(&WireText {
                    text: wire_inline.text.clone().unwrap_or_default(),
                    bold: wire_inline.bold,
                    italic: wire_inline.italic,
                    underline: wire_inline.underline,
                    strikethrough: wire_inline.strikethrough,
                    subscript: wire_inline.subscript,
                    superscript: wire_inline.superscript,
                })));
            } else {
                return Err(DecodeError::EmptyInline {
                    block: b,
                    inline: i,
                });
            }
        }
        if inlines.is_empty() {
            inlines.push(Inline::empty_text());
        }

        out.push(Block {
            kind,
            indent,
            inlines,
        });
    }

    Ok(Document { blocks: out })
}
