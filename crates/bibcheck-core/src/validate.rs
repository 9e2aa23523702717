//! Schema checks on a finished entry.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::entry::BibEntry;
use crate::schema::TypeSchema;

/// Result of validating one entry. `passed` is false when any diagnostic is
/// blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub passed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl Validation {
    /// Whether the entry's type had no schema.
    pub fn unrecognized_type(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::UnrecognizedType { .. }))
    }
}

/// Validate an entry against its type's schema. Never mutates the entry.
///
/// With `suppress_unrecognized_type` an unknown type is reported as a
/// warning instead of an error.
pub fn validate(entry: &BibEntry, suppress_unrecognized_type: bool) -> Validation {
    let key = entry.key();
    let mut diagnostics = Vec::new();

    match TypeSchema::for_type(entry.entry_type()) {
        None => {
            let severity = if suppress_unrecognized_type {
                Severity::Warning
            } else {
                Severity::Error
            };
            let tag = entry.entry_type().bibtex_name().to_string();
            diagnostics.push(Diagnostic::new(
                key,
                severity,
                DiagnosticKind::UnrecognizedType { tag: tag.clone() },
                format!("manually check entry of type @{}", tag),
            ));
        }
        Some(schema) => {
            for field in schema.missing_required(entry) {
                diagnostics.push(Diagnostic::new(
                    key,
                    Severity::Error,
                    DiagnosticKind::SchemaViolation {
                        field: field.to_string(),
                    },
                    format!("missing `{}`", field),
                ));
            }
        }
    }

    if entry.is_informal() {
        diagnostics.push(Diagnostic::new(
            key,
            Severity::Warning,
            DiagnosticKind::InformalVenue,
            "informal publication, cross-check for a published version",
        ));
    }

    let passed = !diagnostics.iter().any(Diagnostic::is_blocking);
    Validation {
        passed,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;

    fn complete_article() -> BibEntry {
        BibEntry::new(EntryType::Article, "k")
            .with_field("title", "T")
            .with_field("author", "A B")
            .with_field("journal", "Neurocomputing")
            .with_field("year", "2020")
    }

    #[test]
    fn complete_article_passes() {
        let v = validate(&complete_article(), false);
        assert!(v.passed);
        assert!(v.diagnostics.is_empty());
    }

    #[test]
    fn missing_fields_each_reported() {
        let entry = BibEntry::new(EntryType::InProceedings, "k")
            .with_field("title", "T")
            .with_field("author", "A")
            .with_field("booktitle", "Proc")
            .with_field("pages", "");
        let v = validate(&entry, false);
        assert!(!v.passed);
        let missing: Vec<_> = v
            .diagnostics
            .iter()
            .filter_map(|d| match &d.kind {
                DiagnosticKind::SchemaViolation { field } => Some(field.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["year", "pages"]);
    }

    #[test]
    fn unrecognized_type_blocks_unless_suppressed() {
        let book = BibEntry::new(EntryType::Other("book".into()), "b").with_field("title", "T");
        let strict = validate(&book, false);
        assert!(!strict.passed);
        assert!(strict.unrecognized_type());
        assert_eq!(strict.diagnostics[0].severity, Severity::Error);

        let lenient = validate(&book, true);
        assert!(lenient.passed);
        assert_eq!(lenient.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn informal_venue_is_a_warning() {
        let corr = complete_article().with_field("journal", "CoRR");
        let v = validate(&corr, false);
        assert!(v.passed);
        assert_eq!(v.diagnostics.len(), 1);
        assert_eq!(v.diagnostics[0].kind, DiagnosticKind::InformalVenue);
    }

    #[test]
    fn validate_does_not_mutate() {
        let entry = complete_article().with_field("note", "a   b");
        let before = entry.clone();
        let _ = validate(&entry, false);
        assert_eq!(entry, before);
    }
}
