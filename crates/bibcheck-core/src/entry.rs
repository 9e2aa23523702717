//! Typed bibliography entries.

use std::fmt;

/// The kind of publication an entry describes.
///
/// Classification is derived from the BibTeX tag (and, for `@misc`, from the
/// presence of eprint markers). The original tag is kept for preprint and
/// unrecognized entries so they serialize the way they were written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// `@article`: a journal publication.
    Article,
    /// `@inproceedings` / `@conference`: a paper in conference proceedings.
    InProceedings,
    /// An informal publication (arXiv-only, unpublished, online). Holds the original tag.
    Preprint(String),
    /// Anything else. Holds the original tag.
    Other(String),
}

impl EntryType {
    /// Classify a BibTeX entry tag.
    ///
    /// `fields` is consulted only for `@misc`, which counts as a preprint when
    /// it carries an `eprint` or `archiveprefix` field.
    pub fn classify(tag: &str, fields: &[(String, String)]) -> Self {
        let lower = tag.trim().to_ascii_lowercase();
        match lower.as_str() {
            "article" => EntryType::Article,
            "inproceedings" | "conference" => EntryType::InProceedings,
            "unpublished" | "online" | "preprint" => EntryType::Preprint(lower),
            "misc"
                if fields
                    .iter()
                    .any(|(name, _)| name == "eprint" || name == "archiveprefix") =>
            {
                EntryType::Preprint(lower)
            }
            _ => EntryType::Other(lower),
        }
    }

    /// The BibTeX tag this type is written back as.
    pub fn bibtex_name(&self) -> &str {
        match self {
            EntryType::Article => "article",
            EntryType::InProceedings => "inproceedings",
            EntryType::Preprint(tag) | EntryType::Other(tag) => tag,
        }
    }

    /// Whether the type has a schema (i.e. is not [`EntryType::Other`]).
    pub fn is_recognized(&self) -> bool {
        !matches!(self, EntryType::Other(_))
    }

    /// The field that names the venue for this type, if it has one.
    pub fn venue_field(&self) -> Option<&'static str> {
        match self {
            EntryType::Article => Some("journal"),
            EntryType::InProceedings => Some("booktitle"),
            EntryType::Preprint(_) | EntryType::Other(_) => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bibtex_name())
    }
}

/// Venue names that mark a record as informal regardless of its entry type.
const INFORMAL_VENUES: &[&str] = &["corr", "arxiv", "biorxiv", "medrxiv", "ssrn"];

/// One bibliography record: a type, an immutable citation key and an ordered
/// field list.
///
/// Field names are stored lowercase. Field order is the order of first
/// insertion; replacing a value keeps its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    entry_type: EntryType,
    key: String,
    fields: Vec<(String, String)>,
}

impl BibEntry {
    pub fn new(entry_type: EntryType, key: impl Into<String>) -> Self {
        Self {
            entry_type,
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entry_type(&self) -> &EntryType {
        &self.entry_type
    }

    pub fn set_entry_type(&mut self, entry_type: EntryType) {
        self.entry_type = entry_type;
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The field value if present and not blank.
    pub fn get_nonempty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    pub fn has_nonempty(&self, name: &str) -> bool {
        self.get_nonempty(name).is_some()
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let pos = self.fields.iter().position(|(n, _)| *n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Number of fields with a non-blank value.
    pub fn completeness(&self) -> usize {
        self.fields
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .count()
    }

    pub fn title(&self) -> Option<&str> {
        self.get_nonempty("title")
    }

    /// The venue text, whichever venue field carries it.
    pub fn venue(&self) -> Option<&str> {
        self.get_nonempty("journal")
            .or_else(|| self.get_nonempty("booktitle"))
    }

    /// Author names split from the `author` field.
    pub fn authors(&self) -> Vec<String> {
        self.get("author")
            .map(crate::authors::split_author_list)
            .unwrap_or_default()
    }

    /// Whether the entry describes an informal publication: a preprint-typed
    /// entry or one whose venue is an eprint server.
    pub fn is_informal(&self) -> bool {
        if matches!(self.entry_type, EntryType::Preprint(_)) {
            return true;
        }
        self.venue().is_some_and(is_informal_venue)
    }

    /// Collapse whitespace and straighten typographic quotes in every field.
    pub fn normalize_whitespace(&mut self) {
        for (_, value) in &mut self.fields {
            let normalized = normalize_value(value);
            if normalized != *value {
                *value = normalized;
            }
        }
    }
}

/// Whether a venue string names an eprint server rather than a publication.
pub fn is_informal_venue(venue: &str) -> bool {
    let lower = venue.trim().to_ascii_lowercase();
    let head = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("");
    INFORMAL_VENUES.contains(&head) || lower.contains("arxiv preprint")
}

/// Collapse whitespace runs to single spaces, trim, and replace typographic
/// quotes with their ASCII counterparts.
pub fn normalize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for word in value.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.replace(['\u{201C}', '\u{201D}', '\u{201E}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<(String, String)> {
        names
            .iter()
            .map(|n| (n.to_string(), "x".to_string()))
            .collect()
    }

    #[test]
    fn classify_known_tags() {
        assert_eq!(EntryType::classify("Article", &[]), EntryType::Article);
        assert_eq!(
            EntryType::classify("conference", &[]),
            EntryType::InProceedings
        );
        assert_eq!(
            EntryType::classify("unpublished", &[]),
            EntryType::Preprint("unpublished".into())
        );
        assert_eq!(
            EntryType::classify("book", &[]),
            EntryType::Other("book".into())
        );
    }

    #[test]
    fn classify_misc_by_eprint() {
        assert_eq!(
            EntryType::classify("misc", &fields(&["title", "eprint"])),
            EntryType::Preprint("misc".into())
        );
        assert_eq!(
            EntryType::classify("misc", &fields(&["title"])),
            EntryType::Other("misc".into())
        );
    }

    #[test]
    fn set_keeps_position_and_returns_previous() {
        let mut e = BibEntry::new(EntryType::Article, "k")
            .with_field("title", "A")
            .with_field("year", "2020");
        assert_eq!(e.set("TITLE", "B"), Some("A".into()));
        assert_eq!(e.fields()[0], ("title".into(), "B".into()));
        assert_eq!(e.set("pages", "1--2"), None);
        assert_eq!(e.fields().len(), 3);
    }

    #[test]
    fn remove_field() {
        let mut e = BibEntry::new(EntryType::Article, "k").with_field("journal", "J");
        assert_eq!(e.remove("journal"), Some("J".into()));
        assert!(e.get("journal").is_none());
        assert!(e.remove("journal").is_none());
    }

    #[test]
    fn informal_detection() {
        let corr = BibEntry::new(EntryType::Article, "a").with_field("journal", "CoRR");
        assert!(corr.is_informal());
        let arxiv = BibEntry::new(EntryType::Article, "b")
            .with_field("journal", "arXiv preprint arXiv:2401.00001");
        assert!(arxiv.is_informal());
        let real = BibEntry::new(EntryType::Article, "c").with_field("journal", "Neurocomputing");
        assert!(!real.is_informal());
        let pre = BibEntry::new(EntryType::Preprint("online".into()), "d");
        assert!(pre.is_informal());
    }

    #[test]
    fn normalize_value_collapses_and_straightens() {
        assert_eq!(
            normalize_value("  \u{201C}Deep\u{201D}\n   Learning\tfor  it\u{2019}s  "),
            "\"Deep\" Learning for it's"
        );
    }

    #[test]
    fn blank_fields_are_not_nonempty() {
        let e = BibEntry::new(EntryType::Article, "k").with_field("pages", "  ");
        assert!(e.get("pages").is_some());
        assert!(!e.has_nonempty("pages"));
        assert_eq!(e.completeness(), 0);
    }
}
