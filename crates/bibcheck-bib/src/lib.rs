//! BibTeX reading and writing for bib-check entries.
//!
//! Parsing goes through the `biblatex` crate. Field values are rebuilt from
//! its chunks so that case-protecting braces and inline math survive a
//! read/write cycle.

mod writer;

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use bibcheck_core::diagnostics::{DiagnosticKind, Diagnostics};
use bibcheck_core::entry::{BibEntry, EntryType};

pub use writer::{write_bibliography, write_entry, write_file};

/// Key used for diagnostics about input that never became an entry.
pub const PARSE_KEY: &str = "<parse>";

#[derive(Error, Debug)]
pub enum BibError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no BibTeX entries found")]
    NoBibEntries,
}

/// A block of input that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 1-based line where the block starts.
    pub line: usize,
    /// First line of the block.
    pub head: String,
    pub message: String,
}

/// Entries in input order, plus the blocks that had to be skipped.
#[derive(Debug, Default)]
pub struct ParsedBibliography {
    pub entries: Vec<BibEntry>,
    pub failures: Vec<ParseFailure>,
}

impl ParsedBibliography {
    /// Record each failure as a `ParseFailure` warning.
    pub fn report_failures(&self, diagnostics: &mut Diagnostics) {
        for failure in &self.failures {
            diagnostics.warn(
                PARSE_KEY,
                DiagnosticKind::ParseFailure { line: failure.line },
                format!(
                    "line {}: skipped `{}` ({})",
                    failure.line, failure.head, failure.message
                ),
            );
        }
    }
}

/// Read and parse a .bib file.
pub fn read_file(path: &Path) -> Result<ParsedBibliography, BibError> {
    let content = std::fs::read_to_string(path)?;
    parse_bibliography(&content)
}

/// Parse .bib content from a string.
///
/// An input with no `@` blocks at all parses to an empty bibliography. When
/// the whole input fails to parse, each `@` block is parsed on its own and
/// the ones that still fail are returned as [`ParseFailure`]s.
pub fn parse_bibliography(content: &str) -> Result<ParsedBibliography, BibError> {
    // Try parsing the whole file first (fast path)
    match biblatex::Bibliography::parse(content) {
        Ok(bibliography) => Ok(ParsedBibliography {
            entries: convert_all(&bibliography, content),
            failures: Vec::new(),
        }),
        Err(e) => {
            tracing::debug!("whole-file parse failed ({}), parsing blocks individually", e);
            parse_blocks_individually(content)
        }
    }
}

/// Parse a string holding exactly one entry, as returned by a record export.
pub fn parse_single(content: &str) -> Result<BibEntry, BibError> {
    let mut parsed = parse_bibliography(content)?;
    if parsed.entries.len() != 1 {
        return Err(BibError::NoBibEntries);
    }
    Ok(parsed.entries.remove(0))
}

/// Split content into `@` blocks and parse each one.
fn parse_blocks_individually(content: &str) -> Result<ParsedBibliography, BibError> {
    static ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*@[a-zA-Z]").unwrap());

    let positions: Vec<usize> = ENTRY_RE.find_iter(content).map(|m| m.start()).collect();
    let mut parsed = ParsedBibliography::default();
    for (i, &start) in positions.iter().enumerate() {
        let end = positions.get(i + 1).copied().unwrap_or(content.len());
        let block = &content[start..end];

        match biblatex::Bibliography::parse(block) {
            Ok(bib) => parsed.entries.extend(convert_all(&bib, block)),
            Err(e) => {
                let line = content[..start].matches('\n').count() + 1;
                let head = block.trim().lines().next().unwrap_or("").trim().to_string();
                tracing::warn!(line, head = %head, "failed to parse block: {}", e);
                parsed.failures.push(ParseFailure {
                    line: line + leading_newlines(block),
                    head,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(parsed)
}

fn leading_newlines(block: &str) -> usize {
    let trimmed = block.trim_start();
    block[..block.len() - trimmed.len()].matches('\n').count()
}

/// Fields whose value is taken as-is, never case-protected.
const VERBATIM_FIELDS: &[&str] = &["url", "doi", "eprint", "file", "pdf", "uri"];

/// How an entry was written: its tag as spelled and its field names in order.
///
/// The resolved bibliography loses both. It maps `@www` to `online`, and a
/// field holding an `@string` macro carries the span of the macro definition.
#[derive(Debug)]
struct SourceLayout {
    tag: String,
    fields: Vec<String>,
}

/// Layouts by citation key, from the unresolved parse of `content`.
fn source_layouts(content: &str) -> HashMap<String, SourceLayout> {
    let mut layouts = HashMap::new();
    let raw = match biblatex::RawBibliography::parse(content) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("raw parse failed ({}), falling back to chunk order", e);
            return layouts;
        }
    };
    for entry in raw.entries {
        let entry = entry.v;
        layouts
            .entry(entry.key.v.to_string())
            .or_insert_with(|| SourceLayout {
                tag: entry.kind.v.to_ascii_lowercase(),
                fields: entry
                    .fields
                    .iter()
                    .map(|pair| pair.key.v.to_ascii_lowercase())
                    .collect(),
            });
    }
    layouts
}

fn convert_all(bibliography: &biblatex::Bibliography, content: &str) -> Vec<BibEntry> {
    let layouts = source_layouts(content);
    bibliography
        .iter()
        .map(|entry| convert_entry(entry, layouts.get(&entry.key)))
        .collect()
}

/// Convert a parsed biblatex entry, keeping the source tag and field order.
fn convert_entry(entry: &biblatex::Entry, layout: Option<&SourceLayout>) -> BibEntry {
    let mut fields: Vec<((usize, usize), String, String)> = entry
        .fields
        .iter()
        .map(|(name, chunks)| {
            let name = name.to_ascii_lowercase();
            let written_at = layout
                .and_then(|l| l.fields.iter().position(|f| *f == name))
                .unwrap_or(usize::MAX);
            let chunk_start = chunks.first().map(|c| c.span.start).unwrap_or(usize::MAX);
            let position = (written_at, chunk_start);
            let value = if VERBATIM_FIELDS.contains(&name.as_str()) {
                plain_text(chunks)
            } else {
                chunks_to_bibtex(chunks)
            };
            (position, name, value)
        })
        .collect();
    fields.sort_by_key(|(position, _, _)| *position);

    let named: Vec<(String, String)> = fields
        .into_iter()
        .map(|(_, name, value)| (name, value))
        .collect();
    let tag = match layout {
        Some(l) => l.tag.clone(),
        None => entry.entry_type.to_string(),
    };
    let mut out = BibEntry::new(EntryType::classify(&tag, &named), entry.key.clone());
    for (name, value) in named {
        out.set(&name, value);
    }
    out
}

fn plain_text(chunks: &[biblatex::Spanned<biblatex::Chunk>]) -> String {
    chunks
        .iter()
        .map(|c| match &c.v {
            biblatex::Chunk::Normal(s) => s.as_str(),
            biblatex::Chunk::Verbatim(s) => s.as_str(),
            biblatex::Chunk::Math(s) => s.as_str(),
        })
        .collect()
}

/// Convert biblatex chunks back to BibTeX field text: protected text in
/// braces, math in `$`, and special characters escaped again.
fn chunks_to_bibtex(chunks: &[biblatex::Spanned<biblatex::Chunk>]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        match &chunk.v {
            biblatex::Chunk::Normal(s) => out.push_str(&escape_normal(s)),
            biblatex::Chunk::Verbatim(s) => {
                out.push('{');
                out.push_str(s);
                out.push('}');
            }
            biblatex::Chunk::Math(s) => {
                out.push('$');
                out.push_str(s);
                out.push('$');
            }
        }
    }
    out
}

fn escape_normal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '#' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '\u{2014}' => out.push_str("---"),
            '\u{2013}' => out.push_str("--"),
            '\u{a0}' => out.push('~'),
            _ => out.push(c),
        }
    }
    out
}
