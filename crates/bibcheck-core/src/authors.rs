use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::matching::strip_latex;

/// Common surname prefixes (case-insensitive).
static SURNAME_PREFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "van", "von", "de", "del", "della", "di", "da", "al", "el", "la", "le", "ben", "ibn",
        "mac", "mc", "o",
    ]
    .into_iter()
    .collect()
});

/// Name suffixes to strip.
static NAME_SUFFIXES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["jr", "sr", "ii", "iii", "iv", "v"].into_iter().collect());

/// DBLP appends a four-digit number to disambiguate homonyms ("Wei Wang 0001").
static DBLP_HOMONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\d{4}$").unwrap());

/// `and` separating names in a BibTeX author list.
static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());

/// Split a BibTeX author field on top-level `and`.
///
/// `and` inside braces (corporate authors such as `{Barnes and Noble}`) does
/// not split. The `others` placeholder is kept so callers can tell a
/// truncated list from a complete one.
pub fn split_author_list(field: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut protected = String::with_capacity(field.len());

    // Blank out braced regions so the `and` regex only sees top-level text.
    for c in field.chars() {
        match c {
            '{' => {
                depth += 1;
                protected.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                protected.push(c);
            }
            _ if depth > 0 => protected.extend(std::iter::repeat_n('_', c.len_utf8())),
            _ => protected.push(c),
        }
    }

    for m in AND_RE.find_iter(&protected) {
        names.push(field[start..m.start()].trim().to_string());
        start = m.end();
    }
    names.push(field[start..].trim().to_string());
    names.retain(|n| !n.is_empty());
    names
}

/// Drop DBLP's homonym number from a name.
pub fn strip_dblp_homonym(name: &str) -> String {
    DBLP_HOMONYM_RE.replace(name.trim(), "").to_string()
}

/// Whether the name is the BibTeX `others` placeholder.
pub fn is_others(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("others")
}

/// Extract surname from name parts, handling multi-word surnames and suffixes.
fn get_surname_from_parts(parts: &[&str]) -> String {
    let mut parts = parts.to_vec();
    while parts.len() >= 2
        && parts
            .last()
            .is_some_and(|p| NAME_SUFFIXES.contains(p.to_lowercase().trim_end_matches('.')))
    {
        parts.pop();
    }

    let Some(last) = parts.last() else {
        return String::new();
    };

    // Three-part surnames like "De La Cruz"
    if parts.len() >= 3
        && SURNAME_PREFIXES.contains(parts[parts.len() - 3].to_lowercase().trim_end_matches('.'))
    {
        return parts[parts.len() - 3..].join(" ");
    }

    // Two-part surnames like "Van Bavel"
    if parts.len() >= 2
        && SURNAME_PREFIXES.contains(parts[parts.len() - 2].to_lowercase().trim_end_matches('.'))
    {
        return parts[parts.len() - 2..].join(" ");
    }

    last.to_string()
}

/// The family name of an author, normalized for comparison (lowercase ASCII,
/// no LaTeX, no diacritics).
///
/// Handles both "Surname, Given" and "Given Surname" orders.
pub fn family_name(name: &str) -> String {
    let name = strip_dblp_homonym(&strip_latex(name));
    let surname = if let Some((surname, _)) = name.split_once(',') {
        surname.trim().to_string()
    } else {
        let parts: Vec<&str> = name.split_whitespace().collect();
        get_surname_from_parts(&parts)
    };
    surname
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .to_lowercase()
}

/// Fraction of `local` surnames found among `remote` surnames, in `[0, 1]`.
///
/// `others` placeholders are ignored. Returns `None` when the local list has
/// no usable names, so callers can fall back to title-only scoring.
pub fn author_overlap(local: &[String], remote: &[String]) -> Option<f64> {
    let local_names: Vec<String> = local
        .iter()
        .filter(|a| !is_others(a))
        .map(|a| family_name(a))
        .filter(|s| !s.is_empty())
        .collect();
    if local_names.is_empty() {
        return None;
    }

    let remote_names: HashSet<String> = remote
        .iter()
        .filter(|a| !is_others(a))
        .map(|a| family_name(a))
        .filter(|s| !s.is_empty())
        .collect();

    let hits = local_names
        .iter()
        .filter(|n| {
            remote_names.contains(n.as_str())
                || remote_names
                    .iter()
                    .any(|r| r.ends_with(n.as_str()) || n.ends_with(r.as_str()))
        })
        .count();
    Some(hits as f64 / local_names.len() as f64)
}
