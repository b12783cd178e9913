//! DTX - wire-format tooling for dictionary article documents

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dtx_core::{nest, BlockKind, Document, Inline, NestedBlock};
use std::path::{Path, PathBuf};

/// Inspect and normalize dictionary article documents
#[derive(Parser, Debug)]
#[command(name = "dtx")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a document and print its reconstructed nesting tree
    Inspect {
        /// Path to a wire-format JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Decode and re-encode a document, verifying the round trip
    Normalize {
        /// Path to a wire-format JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Write the result here instead of stdout
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    match args.command {
        Command::Inspect { file } => inspect(&file),
        Command::Normalize { file, output } => normalize(&file, output.as_deref()),
    }
}

fn inspect(file: &Path) -> Result<()> {
    let doc = Document::load(file)
        .with_context(|| format!("Failed to load document: {}", file.display()))?;

    for node in nest(&doc.blocks) {
        print_node(&node, 0);
    }
    Ok(())
}

fn normalize(file: &Path, output: Option<&Path>) -> Result<()> {
    let doc = Document::load(file)
        .with_context(|| format!("Failed to load document: {}", file.display()))?;

    match output {
        Some(out) => doc.save(out),
        None => {
            let json = serde_json::to_string_pretty(&dtx_core::to_wire(&doc))
                .context("Failed to encode document")?;
            println!("{json}");
            Ok(())
        }
    }
}

fn print_node(node: &NestedBlock, depth: usize) {
    let pad = "  ".repeat(depth);
    match node {
        NestedBlock::Simple {
            kind,
            indent,
            inlines,
        } => {
            println!("{pad}{}@{indent}: {}", kind_name(*kind), inline_text(inlines));
        }
        NestedBlock::List {
            kind,
            indent,
            items,
        } => {
            println!("{pad}{}@{indent}", kind_name(*kind));
            for item in items {
                println!("{pad}  - {}", inline_text(&item.inlines));
                for child in &item.children {
                    print_node(child, depth + 2);
                }
            }
        }
    }
}

fn kind_name(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Paragraph => "paragraph",
        BlockKind::Heading1 => "heading1",
        BlockKind::Heading2 => "heading2",
        BlockKind::OrderedListItem => "olist",
        BlockKind::UnorderedListItem => "ulist",
    }
}

fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) => out.push_str(&t.text),
            Inline::Link(l) => {
                for child in &l.children {
                    out.push_str(&child.text);
                }
                out.push_str(&format!(" [{}]", l.target.url));
            }
        }
    }
    out
}
