//! Merge a resolved candidate into the local entry.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::entry::{BibEntry, EntryType, normalize_value};
use crate::resolver::ResolutionOutcome;
use crate::schema::TypeSchema;

/// Fields the database is trusted for, besides the venue. Local values are
/// overwritten when the candidate has a non-empty value.
pub const AUTHORITATIVE_FIELDS: &[&str] = &[
    "title", "author", "year", "volume", "number", "pages", "doi",
];

/// One field that differs between the input entry and the reconciled one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// The reconciled entry plus what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub entry: BibEntry,
    pub changes: Vec<FieldChange>,
    /// Set when the entry type was replaced by the candidate's.
    pub retyped_from: Option<EntryType>,
}

/// Reconcile one entry against its resolution outcome.
///
/// The key is never touched. On a match only the values taken from the
/// record are normalized; every other field is kept verbatim. Without a
/// match only whitespace and quote normalization is applied.
pub fn reconcile(
    entry: BibEntry,
    outcome: &ResolutionOutcome,
    diagnostics: &mut Diagnostics,
) -> Reconciliation {
    let original = entry.clone();
    let mut merged = entry;

    let retyped_from = match outcome {
        ResolutionOutcome::Matched(candidate) => {
            let retyped = merge_record(&mut merged, candidate.entry());
            report_unfillable(&merged, diagnostics);
            retyped
        }
        ResolutionOutcome::NoHits
        | ResolutionOutcome::ManualReviewRequired(_)
        | ResolutionOutcome::AmbiguousPendingChoice(_) => {
            merged.normalize_whitespace();
            None
        }
    };

    let changes = diff_fields(&original, &merged);
    if !changes.is_empty() || retyped_from.is_some() {
        tracing::info!(
            key = %merged.key(),
            changed = changes.len(),
            retyped = retyped_from.is_some(),
            "reconciled entry"
        );
    }

    Reconciliation {
        entry: merged,
        changes,
        retyped_from,
    }
}

/// Overwrite authoritative fields from `remote`. Returns the previous type
/// when the entry was retyped.
fn merge_record(local: &mut BibEntry, remote: &BibEntry) -> Option<EntryType> {
    let mut retyped = None;
    let remote_type = remote.entry_type();
    if remote_type.is_recognized() && remote_type != local.entry_type() {
        retyped = Some(local.entry_type().clone());
        local.set_entry_type(remote_type.clone());
    }

    if let Some(venue_field) = local.entry_type().venue_field() {
        let venue = remote.venue().or_else(|| local.venue()).map(normalize_value);
        if let Some(venue) = venue {
            for other in ["journal", "booktitle"] {
                if other != venue_field {
                    local.remove(other);
                }
            }
            local.set(venue_field, venue);
        }
    }

    for field in AUTHORITATIVE_FIELDS {
        if let Some(value) = remote.get_nonempty(field) {
            local.set(field, normalize_value(value));
        }
    }

    retyped
}

fn report_unfillable(entry: &BibEntry, diagnostics: &mut Diagnostics) {
    let Some(schema) = TypeSchema::for_type(entry.entry_type()) else {
        return;
    };
    for field in schema.missing_required(entry) {
        diagnostics.error(
            entry.key(),
            DiagnosticKind::SchemaViolation {
                field: field.to_string(),
            },
            format!("`{}` missing locally and in the matched record", field),
        );
    }
}

/// Field-level differences between two versions of an entry, in the order
/// fields appear in `before` followed by fields only in `after`.
pub fn diff_fields(before: &BibEntry, after: &BibEntry) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for (name, old) in before.fields() {
        let new = after.get(name);
        if new != Some(old.as_str()) {
            changes.push(FieldChange {
                field: name.clone(),
                before: Some(old.clone()),
                after: new.map(str::to_string),
            });
        }
    }
    for (name, new) in after.fields() {
        if before.get(name).is_none() {
            changes.push(FieldChange {
                field: name.clone(),
                before: None,
                after: Some(new.clone()),
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SourceType;
    use crate::db::mock::record;
    use crate::matcher::{Candidate, MatchScore};
    use crate::resolver::ManualReviewReason;

    fn matched(source_type: SourceType, fields: &[(&str, &str)]) -> ResolutionOutcome {
        ResolutionOutcome::Matched(Candidate {
            record: record("dblp:x", source_type, fields),
            score: MatchScore {
                title: 1.0,
                authors: Some(1.0),
                combined: 1.0,
            },
        })
    }

    fn foo2020() -> BibEntry {
        BibEntry::new(EntryType::Other("misc".into()), "foo2020")
            .with_field("title", "Attention Is All You Need")
            .with_field("author", "Vaswani, A. and others")
            .with_field("year", "2017")
            .with_field("note", "cited   twice")
    }

    #[test]
    fn conference_match_retypes_and_moves_venue() {
        let outcome = matched(
            SourceType::Conference,
            &[
                ("title", "Attention is All you Need"),
                ("author", "Ashish Vaswani and Noam Shazeer"),
                ("booktitle", "NeurIPS"),
                ("year", "2017"),
                ("pages", "5998--6008"),
            ],
        );
        let mut diags = Diagnostics::new();
        let r = reconcile(foo2020(), &outcome, &mut diags);

        assert_eq!(r.entry.key(), "foo2020");
        assert_eq!(r.entry.entry_type(), &EntryType::InProceedings);
        assert_eq!(r.retyped_from, Some(EntryType::Other("misc".into())));
        assert_eq!(r.entry.get("booktitle"), Some("NeurIPS"));
        assert_eq!(r.entry.get("author"), Some("Ashish Vaswani and Noam Shazeer"));
        assert_eq!(r.entry.get("note"), Some("cited   twice"));
        assert!(diags.is_empty());
        assert!(r.changes.iter().any(|c| c.field == "booktitle" && c.before.is_none()));
        assert!(!r.changes.iter().any(|c| c.field == "note"));
    }

    #[test]
    fn match_keeps_other_fields_verbatim() {
        let abstract_text = "First paragraph.\n\n  Second   paragraph with \u{201c}quotes\u{201d}.";
        let local = foo2020()
            .with_field("abstract", abstract_text)
            .with_field("title", "Attention  Is All\nYou Need");
        let outcome = matched(
            SourceType::Conference,
            &[
                ("title", "Attention is   All you Need"),
                ("author", "Ashish Vaswani"),
                ("booktitle", "NeurIPS"),
                ("year", "2017"),
                ("pages", "5998--6008"),
            ],
        );
        let r = reconcile(local, &outcome, &mut Diagnostics::new());
        assert_eq!(r.entry.get("abstract"), Some(abstract_text));
        assert_eq!(r.entry.get("title"), Some("Attention is All you Need"));
    }

    #[test]
    fn journal_match_drops_booktitle() {
        let local = BibEntry::new(EntryType::InProceedings, "k")
            .with_field("title", "T")
            .with_field("booktitle", "Some Workshop");
        let outcome = matched(
            SourceType::Journal,
            &[("title", "T"), ("journal", "Neurocomputing"), ("author", "A B"), ("year", "2020")],
        );
        let r = reconcile(local, &outcome, &mut Diagnostics::new());
        assert_eq!(r.entry.entry_type(), &EntryType::Article);
        assert_eq!(r.entry.get("journal"), Some("Neurocomputing"));
        assert!(r.entry.get("booktitle").is_none());
    }

    #[test]
    fn missing_required_on_both_sides_is_reported() {
        let outcome = matched(
            SourceType::Conference,
            &[("title", "Attention is All you Need"), ("booktitle", "NeurIPS")],
        );
        let mut diags = Diagnostics::new();
        let r = reconcile(foo2020(), &outcome, &mut diags);
        assert!(r.entry.get("pages").is_none());
        let kinds: Vec<_> = diags.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::SchemaViolation {
                field: "pages".into()
            }]
        );
        assert!(diags.has_blocking());
    }

    #[test]
    fn unmatched_entries_only_get_whitespace_normalized() {
        for outcome in [
            ResolutionOutcome::NoHits,
            ResolutionOutcome::ManualReviewRequired(ManualReviewReason::InformalSingleHit),
        ] {
            let r = reconcile(foo2020(), &outcome, &mut Diagnostics::new());
            assert_eq!(r.retyped_from, None);
            assert_eq!(r.entry.entry_type(), &EntryType::Other("misc".into()));
            assert_eq!(
                r.changes,
                vec![FieldChange {
                    field: "note".into(),
                    before: Some("cited   twice".into()),
                    after: Some("cited twice".into()),
                }]
            );
        }
    }

    #[test]
    fn reconciling_twice_changes_nothing() {
        let outcome = matched(
            SourceType::Conference,
            &[
                ("title", "Attention is All you Need"),
                ("author", "Ashish Vaswani"),
                ("booktitle", "NeurIPS"),
                ("year", "2017"),
                ("pages", "5998--6008"),
            ],
        );
        let first = reconcile(foo2020(), &outcome, &mut Diagnostics::new());
        let second = reconcile(first.entry.clone(), &outcome, &mut Diagnostics::new());
        assert!(second.changes.is_empty());
        assert_eq!(second.retyped_from, None);
        assert_eq!(second.entry, first.entry);
    }
}
