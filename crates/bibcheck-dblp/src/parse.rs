//! Conversion of DBLP search responses and record exports into
//! [`RemoteRecord`]s.

use serde_json::Value;

use bibcheck_core::authors::{split_author_list, strip_dblp_homonym};
use bibcheck_core::entry::{BibEntry, EntryType};
use bibcheck_core::{LookupError, RemoteRecord, SourceType};

/// Map DBLP's publication type label to a source type.
///
/// CoRR is DBLP's arXiv mirror and is informal whatever the label says.
pub fn source_type(label: &str, venue: Option<&str>) -> SourceType {
    if venue.is_some_and(|v| v.trim().eq_ignore_ascii_case("corr")) {
        return SourceType::Informal;
    }
    match label {
        "Journal Articles" => SourceType::Journal,
        "Conference and Workshop Papers" => SourceType::Conference,
        "Informal Publications" | "Informal and Other Publications" => SourceType::Informal,
        _ => SourceType::Other,
    }
}

/// Parse the body of `/search/publ/api?format=json`.
///
/// A response without a `hit` array (zero results) yields no records. Hits
/// without a title are skipped.
pub fn parse_search_response(body: &str) -> Result<Vec<RemoteRecord>, LookupError> {
    let data: Value =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;
    let result = data
        .get("result")
        .ok_or_else(|| LookupError::Malformed("missing `result`".to_string()))?;

    let hits = result["hits"]["hit"].as_array().cloned().unwrap_or_default();
    Ok(hits.iter().filter_map(parse_hit).collect())
}

fn parse_hit(hit: &Value) -> Option<RemoteRecord> {
    let info = &hit["info"];
    let title = info["title"].as_str().map(clean_title)?;
    if title.is_empty() {
        return None;
    }

    let id = info["key"]
        .as_str()
        .or_else(|| hit["@id"].as_str())
        .unwrap_or_default()
        .to_string();
    let venue = venue_of(&info["venue"]);
    let source_type = source_type(info["type"].as_str().unwrap_or(""), venue.as_deref());

    let mut entry = BibEntry::new(entry_type_for(source_type), format!("DBLP:{}", id));
    entry.set("title", title);
    let authors = authors_of(&info["authors"]["author"]);
    if !authors.is_empty() {
        entry.set("author", authors.join(" and "));
    }
    if let Some(venue) = venue
        && let Some(field) = entry.entry_type().venue_field()
    {
        entry.set(field, venue);
    }
    for field in ["year", "volume", "number", "doi"] {
        if let Some(value) = scalar(&info[field]) {
            entry.set(field, value);
        }
    }
    if let Some(pages) = scalar(&info["pages"]) {
        entry.set("pages", bibtex_page_range(&pages));
    }
    if let Some(ee) = info["ee"].as_str() {
        entry.set("url", ee);
    }

    Some(RemoteRecord {
        id,
        source_type,
        entry,
        export_url: info["url"].as_str().map(|u| format!("{}.bib", u)),
    })
}

/// Rebuild a search hit from its exported BibTeX form.
///
/// The export is authoritative for field values; the hit keeps its id and
/// source type.
pub fn full_record(hit: &RemoteRecord, mut exported: BibEntry) -> RemoteRecord {
    if let Some(author) = exported.get("author").map(str::to_string) {
        let cleaned: Vec<String> = split_author_list(&author)
            .iter()
            .map(|name| strip_dblp_homonym(name))
            .collect();
        exported.set("author", cleaned.join(" and "));
    }
    for field in ["timestamp", "biburl", "bibsource"] {
        exported.remove(field);
    }
    RemoteRecord {
        id: hit.id.clone(),
        source_type: hit.source_type,
        entry: exported,
        export_url: hit.export_url.clone(),
    }
}

fn entry_type_for(source_type: SourceType) -> EntryType {
    match source_type {
        SourceType::Journal | SourceType::Informal => EntryType::Article,
        SourceType::Conference => EntryType::InProceedings,
        SourceType::Other => EntryType::Other("misc".to_string()),
    }
}

/// DBLP titles end with a period that is not part of the title.
fn clean_title(title: &str) -> String {
    let title = title.trim();
    title.strip_suffix('.').unwrap_or(title).trim_end().to_string()
}

/// `venue` is a string, or an array for records listed under several venues.
fn venue_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(arr) => arr.iter().find_map(|v| v.as_str()).map(String::from),
        _ => None,
    }
    .filter(|v| !v.trim().is_empty())
}

/// `author` is an array for several authors and a bare object for one.
fn authors_of(value: &Value) -> Vec<String> {
    let names: Vec<&str> = match value {
        Value::Array(arr) => arr
            .iter()
            .filter_map(|a| a["text"].as_str().or_else(|| a.as_str()))
            .collect(),
        Value::Object(obj) => obj.get("text").and_then(|v| v.as_str()).into_iter().collect(),
        Value::String(s) => vec![s.as_str()],
        _ => vec![],
    };
    names
        .into_iter()
        .map(strip_dblp_homonym)
        .filter(|n| !n.is_empty())
        .collect()
}

/// DBLP separates page ranges with a single hyphen; BibTeX uses `--`.
fn bibtex_page_range(pages: &str) -> String {
    match pages.split_once('-') {
        Some((start, end)) if !start.is_empty() && !end.starts_with('-') => {
            format!("{}--{}", start.trim(), end.trim())
        }
        _ => pages.to_string(),
    }
}

/// Years sometimes arrive as numbers in mirrors of the API.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
