//! DTX Core - Rich-text document engine for dictionary articles
//!
//! This crate contains the core logic for dtx, independent of any UI
//! concerns:
//! - Document model: a flat, indentation-leveled block sequence
//! - Low-level edit operations with deterministic inverses
//! - Undo/redo history with operation coalescing
//! - Formatting transforms (block kinds, indents, marks, links)
//! - Nesting reconstructor for rendering and export
//! - Wire-format adapters for the backend schema

pub mod doc;
pub mod editor;
pub mod format;
pub mod history;
pub mod nest;
pub mod op;
pub mod selection;
pub mod wire;

// Re-export commonly used types
pub use doc::{Block, BlockKind, Document, FormattedText, Inline, Link, LinkTarget, Mark, Path};
pub use editor::Editor;
pub use nest::{nest, ListItem, NestedBlock};
pub use op::{NodeProps, Operation};
pub use selection::{Point, Selection};
pub use wire::{from_wire, to_wire, DecodeError, WireBlock};
