//! Per-type required and optional field table.

use crate::entry::{BibEntry, EntryType};

/// Required and optional fields for one recognized entry type.
#[derive(Debug)]
pub struct TypeSchema {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

static ARTICLE: TypeSchema = TypeSchema {
    required: &["title", "author", "journal", "year"],
    optional: &[
        "volume",
        "number",
        "pages",
        "doi",
        "url",
        "month",
        "publisher",
        "note",
    ],
};

static INPROCEEDINGS: TypeSchema = TypeSchema {
    required: &["title", "author", "booktitle", "year", "pages"],
    optional: &[
        "editor",
        "volume",
        "series",
        "publisher",
        "address",
        "doi",
        "url",
        "month",
        "note",
    ],
};

static PREPRINT: TypeSchema = TypeSchema {
    required: &["title", "author", "year"],
    optional: &[
        "eprint",
        "archiveprefix",
        "primaryclass",
        "howpublished",
        "journal",
        "doi",
        "url",
        "month",
        "note",
    ],
};

impl TypeSchema {
    /// The schema for a type; `None` for unrecognized types.
    pub fn for_type(entry_type: &EntryType) -> Option<&'static TypeSchema> {
        match entry_type {
            EntryType::Article => Some(&ARTICLE),
            EntryType::InProceedings => Some(&INPROCEEDINGS),
            EntryType::Preprint(_) => Some(&PREPRINT),
            EntryType::Other(_) => None,
        }
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.contains(&field)
    }

    /// Whether the field is named by this schema at all.
    pub fn contains(&self, field: &str) -> bool {
        self.required.contains(&field) || self.optional.contains(&field)
    }

    /// Required fields that are absent or blank on `entry`, in schema order.
    pub fn missing_required(&self, entry: &BibEntry) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|f| !entry.has_nonempty(f))
            .collect()
    }

    /// Position of a field in canonical output order: required fields first,
    /// then optional ones, then everything else.
    pub fn rank(&self, field: &str) -> usize {
        if let Some(i) = self.required.iter().position(|f| *f == field) {
            return i;
        }
        if let Some(i) = self.optional.iter().position(|f| *f == field) {
            return self.required.len() + i;
        }
        self.required.len() + self.optional.len()
    }
}
