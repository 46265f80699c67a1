//! epub-cfi command line
//!
//! Parses, orders and resolves EPUB CFIs against XHTML content documents.
//!
//! # Usage
//!
//! ```bash
//! epub-cfi parse 'epubcfi(/6/4[chap01ref]!/4/2/1:3)'
//! epub-cfi compare 'epubcfi(/6/4!/4/2/1:3)' 'epubcfi(/6/4!/4/2/1:7)'
//! epub-cfi sort highlights.txt
//! epub-cfi resolve chapter.xhtml 'epubcfi(/6/4!/4/2/1:3)'
//! epub-cfi encode chapter.xhtml para-12 --offset 40 --spine 3
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epub_cfi::cfi::{
    compare, compare_cfi_strings, generate_chapter_component, parse, parse_component,
    text_descendants, Cfi, CfiEngine,
};
use epub_cfi::config::{Config, OutputFormat};
use epub_cfi::tree::{parse_xhtml, Boundary, DocumentTree, DomRange, NodeKind, XmlTree};

#[derive(Parser)]
#[command(name = "epub-cfi")]
#[command(version)]
#[command(about = "Parse, compare and resolve EPUB Canonical Fragment Identifiers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (overrides EPUB_CFI_OUTPUT)
    #[arg(long, short = 'o', global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Class of injected elements to exclude from addressing (overrides
    /// EPUB_CFI_IGNORE_CLASS)
    #[arg(long, global = true)]
    ignore_class: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CFI and print its structure
    Parse { cfi: String },

    /// Compare two CFIs, printing -1, 0 or 1
    Compare { a: String, b: String },

    /// Sort a file of CFIs (one per line) into reading order
    Sort { file: PathBuf },

    /// Resolve a CFI against an XHTML content document
    Resolve { xhtml: PathBuf, cfi: String },

    /// Generate the CFI of an element, or of a character in its text
    Encode {
        xhtml: PathBuf,
        element_id: String,

        /// Character offset into the element's first text node
        #[arg(long)]
        offset: Option<usize>,

        /// 0-based spine position of the content document
        #[arg(long, default_value_t = 0)]
        spine: usize,
    },
}

/// Resolved boundary as printed by `resolve`
#[derive(Debug, Serialize, PartialEq, Eq)]
struct ResolvedBoundary {
    node: String,
    offset: usize,
}

#[derive(Debug, Serialize)]
struct ResolvedRange {
    cfi: String,
    start: ResolvedBoundary,
    end: ResolvedBoundary,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let loaded = Config::from_env();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = &loaded {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
    }

    let cli = Cli::parse();
    let format = cli.format.unwrap_or(config.output);
    let ignore_class = cli.ignore_class.or(config.ignore_class);

    match cli.command {
        Commands::Parse { cfi } => {
            let parsed = parse(&cfi);
            if !parsed.is_valid() {
                tracing::warn!("Not a valid CFI: {}", cfi);
            }
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&parsed)?),
                OutputFormat::Text => print!("{}", describe_cfi(&parsed)),
            }
        }
        Commands::Compare { a, b } => {
            println!("{}", ordering_value(compare_cfi_strings(&a, &b)));
        }
        Commands::Sort { file } => {
            for line in sort_file(&file)? {
                println!("{}", line);
            }
        }
        Commands::Resolve { xhtml, cfi } => {
            let text = read(&xhtml)?;
            let doc = parse_xhtml(&text)
                .with_context(|| format!("Failed to parse {}", xhtml.display()))?;
            let tree = XmlTree::new(&doc);
            let resolved = resolve(&tree, &cfi, ignore_class)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
                OutputFormat::Text => {
                    println!("start: {} @ {}", resolved.start.node, resolved.start.offset);
                    println!("end:   {} @ {}", resolved.end.node, resolved.end.offset);
                }
            }
        }
        Commands::Encode {
            xhtml,
            element_id,
            offset,
            spine,
        } => {
            let text = read(&xhtml)?;
            let doc = parse_xhtml(&text)
                .with_context(|| format!("Failed to parse {}", xhtml.display()))?;
            let tree = XmlTree::new(&doc);
            let cfi = encode(&tree, &element_id, offset, spine, ignore_class)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cfi)?),
                OutputFormat::Text => println!("{}", cfi),
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn ordering_value(ordering: Ordering) -> i8 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

fn describe_cfi(cfi: &Cfi) -> String {
    let mut out = format!("cfi:      {}\n", cfi);
    match cfi.spine_index() {
        Some(index) => out.push_str(&format!("spine:    {}\n", index)),
        None => out.push_str("spine:    invalid\n"),
    }
    out.push_str(&format!("base:     {}\n", cfi.base));
    out.push_str(&format!("path:     {}\n", cfi.path));
    if let (Some(start), Some(end)) = (cfi.start(), cfi.end()) {
        out.push_str(&format!("start:    {}\n", start));
        out.push_str(&format!("end:      {}\n", end));
    }
    if let Some(assertion) = cfi.path.terminal.text_assertion() {
        out.push_str(&format!("asserts:  {:?}\n", assertion));
    }
    out
}

/// Non-empty lines of `path` in reading order. Lines at the same position
/// keep their file order.
fn sort_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = read(path)?;
    let mut entries: Vec<(Cfi, &str)> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| (parse(line), line))
        .collect();

    let invalid = entries.iter().filter(|(cfi, _)| !cfi.is_valid()).count();
    if invalid > 0 {
        tracing::warn!("{} invalid CFIs in {}, sorting them first", invalid, path.display());
    }

    entries.sort_by(|(a, _), (b, _)| compare(a, b));
    Ok(entries.into_iter().map(|(_, line)| line.to_string()).collect())
}

fn engine_for<'a, 'i>(
    tree: &'a XmlTree<'a, 'i>,
    ignore_class: Option<String>,
) -> CfiEngine<'a, XmlTree<'a, 'i>> {
    let engine = CfiEngine::new(tree);
    match ignore_class {
        Some(class) => engine.with_ignore_class(class),
        None => engine,
    }
}

fn resolve(
    tree: &XmlTree<'_, '_>,
    cfi: &str,
    ignore_class: Option<String>,
) -> anyhow::Result<ResolvedRange> {
    let parsed = parse(cfi);
    if !parsed.is_valid() {
        bail!("Not a valid CFI: {}", cfi);
    }

    let engine = engine_for(tree, ignore_class);
    let Some(range) = engine.to_range(&parsed) else {
        bail!("No location for {} in this document", cfi);
    };

    Ok(ResolvedRange {
        cfi: parsed.to_string(),
        start: describe_boundary(tree, range.start),
        end: describe_boundary(tree, range.end),
    })
}

fn encode(
    tree: &XmlTree<'_, '_>,
    element_id: &str,
    offset: Option<usize>,
    spine: usize,
    ignore_class: Option<String>,
) -> anyhow::Result<Cfi> {
    let Some(element) = tree.get_element_by_id(element_id) else {
        bail!("No element with id {}", element_id);
    };

    let engine = engine_for(tree, ignore_class);
    // the package spine is the third child of <package>: /6
    let base = parse_component(&generate_chapter_component(2, spine, None));

    match offset {
        Some(offset) => {
            let Some(text) = text_descendants(tree, element).first().copied() else {
                bail!("Element {} has no text", element_id);
            };
            let available = tree.text_length(text);
            if offset > available {
                bail!("Offset {} is past the end of the text ({})", offset, available);
            }
            let range = DomRange::caret(Boundary::new(text, offset));
            Ok(engine.from_range(&range, base))
        }
        None => Ok(engine.from_node(element, base)),
    }
}

/// `html/body/p[id]/#text` style location of a boundary
fn describe_boundary<'a, 'i: 'a>(
    tree: &XmlTree<'a, 'i>,
    boundary: Boundary<roxmltree::Node<'a, 'i>>,
) -> ResolvedBoundary {
    let mut parts = Vec::new();
    let mut current = Some(boundary.container);
    while let Some(node) = current {
        let part = match tree.kind(node) {
            NodeKind::Text => "#text".to_string(),
            NodeKind::Other => "#other".to_string(),
            NodeKind::Element => {
                let name = tree.tag_name(node).unwrap_or("?");
                match tree.id(node) {
                    Some(id) => format!("{}[{}]", name, id),
                    None => name.to_string(),
                }
            }
        };
        parts.push(part);
        current = tree.parent(node);
    }
    parts.reverse();

    ResolvedBoundary {
        node: parts.join("/"),
        offset: boundary.offset,
    }
}
