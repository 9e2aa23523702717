//! The run loop: every entry, in input order, through lookup, resolution,
//! reconciliation, validation and optional revision.

use crate::Config;
use crate::db::BibliographicDatabase;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::entry::BibEntry;
use crate::matcher::{Candidate, CandidateMatcher};
use crate::reconcile::{FieldChange, Reconciliation, diff_fields, reconcile};
use crate::resolver::{Chooser, ResolutionOutcome, resolve, settle};
use crate::revise::RevisionAdapter;
use crate::validate::validate;

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checking {
        index: usize,
        total: usize,
        key: String,
    },
    Resolved {
        index: usize,
        total: usize,
        key: String,
        outcome: &'static str,
        changes: usize,
    },
    Revised {
        key: String,
        changes: Vec<FieldChange>,
    },
    Halted {
        index: usize,
        key: String,
    },
}

/// Summary statistics for a complete run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub matched: usize,
    pub no_hits: usize,
    pub manual_review: usize,
    pub lookup_failures: usize,
    /// Entries whose type or fields changed.
    pub changed: usize,
    pub revised_fields: usize,
    /// Entries written out untouched after a halt.
    pub copied_through: usize,
}

/// What changed on one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChanges {
    pub key: String,
    pub changes: Vec<FieldChange>,
}

/// Everything a run produced. Entries are in input order.
#[derive(Debug)]
pub struct RunReport {
    pub entries: Vec<BibEntry>,
    pub changes: Vec<EntryChanges>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RunStats,
    /// Key of the entry the run halted at.
    pub halted_at: Option<String>,
}

impl RunReport {
    pub fn has_blocking(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_blocking)
    }
}

/// One reconciliation run over a bibliography.
pub struct Pipeline<'a> {
    config: &'a Config,
    database: Option<&'a dyn BibliographicDatabase>,
    reviser: Option<&'a RevisionAdapter>,
    chooser: &'a mut dyn Chooser,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, chooser: &'a mut dyn Chooser) -> Self {
        Self {
            config,
            database: None,
            reviser: None,
            chooser,
        }
    }

    /// Enable the lookup pass against `database`.
    pub fn with_database(mut self, database: &'a dyn BibliographicDatabase) -> Self {
        self.database = Some(database);
        self
    }

    /// Enable the revision pass.
    pub fn with_reviser(mut self, reviser: &'a RevisionAdapter) -> Self {
        self.reviser = Some(reviser);
        self
    }

    /// Process `entries` strictly in order.
    ///
    /// `diagnostics` may already hold issues found while reading the input;
    /// it is consumed into the report. An unrecognized entry type without
    /// suppression halts the run: the remaining entries are copied through
    /// untouched and still appear in the report.
    pub async fn run(
        mut self,
        entries: Vec<BibEntry>,
        mut diagnostics: Diagnostics,
        progress: impl Fn(ProgressEvent),
    ) -> RunReport {
        let total = entries.len();
        let mut stats = RunStats {
            total,
            ..RunStats::default()
        };
        let mut out = Vec::with_capacity(total);
        let mut all_changes = Vec::new();
        let mut halted_at: Option<String> = None;

        for (index, entry) in entries.into_iter().enumerate() {
            if halted_at.is_some() {
                stats.copied_through += 1;
                out.push(entry);
                continue;
            }

            progress(ProgressEvent::Checking {
                index,
                total,
                key: entry.key().to_string(),
            });

            let (mut entry, mut changes, outcome) =
                self.check_entry(entry, &mut stats, &mut diagnostics).await;

            let validation = validate(&entry, self.config.suppress_type);
            let halt = validation.unrecognized_type() && !self.config.suppress_type;
            diagnostics.extend(validation.diagnostics);

            progress(ProgressEvent::Resolved {
                index,
                total,
                key: entry.key().to_string(),
                outcome,
                changes: changes.len(),
            });

            if halt {
                diagnostics.error(
                    entry.key(),
                    DiagnosticKind::Halted,
                    format!(
                        "stopped at @{}; {} remaining entries copied unchanged",
                        entry.entry_type(),
                        total - index - 1
                    ),
                );
                progress(ProgressEvent::Halted {
                    index,
                    key: entry.key().to_string(),
                });
                halted_at = Some(entry.key().to_string());
            } else if let Some(reviser) = self.config.use_ai.then_some(self.reviser).flatten() {
                let revised = reviser.revise(&mut entry, &mut diagnostics).await;
                if !revised.is_empty() {
                    stats.revised_fields += revised.len();
                    progress(ProgressEvent::Revised {
                        key: entry.key().to_string(),
                        changes: revised.clone(),
                    });
                    changes.extend(revised);
                }
            }

            if !changes.is_empty() {
                stats.changed += 1;
                all_changes.push(EntryChanges {
                    key: entry.key().to_string(),
                    changes,
                });
            }
            out.push(entry);
        }

        tracing::info!(
            total = stats.total,
            matched = stats.matched,
            changed = stats.changed,
            halted = halted_at.is_some(),
            "run finished"
        );

        RunReport {
            entries: out,
            changes: all_changes,
            diagnostics: diagnostics.finish(),
            stats,
            halted_at,
        }
    }

    /// Lookup, resolution and reconciliation for one entry. Without a
    /// database only whitespace normalization is applied.
    async fn check_entry(
        &mut self,
        entry: BibEntry,
        stats: &mut RunStats,
        diagnostics: &mut Diagnostics,
    ) -> (BibEntry, Vec<FieldChange>, &'static str) {
        let database = match self.database {
            Some(db) if self.config.use_dblp => db,
            _ => {
                let mut normalized = entry.clone();
                normalized.normalize_whitespace();
                let changes = diff_fields(&entry, &normalized);
                return (normalized, changes, "normalized");
            }
        };

        let outcome = self.lookup(database, &entry, stats, diagnostics).await;
        let outcome = match outcome {
            ResolutionOutcome::Matched(candidate) if self.config.fetch_full_records => {
                ResolutionOutcome::Matched(
                    refresh_candidate(database, candidate, entry.key(), diagnostics).await,
                )
            }
            other => other,
        };

        match &outcome {
            ResolutionOutcome::Matched(_) => stats.matched += 1,
            ResolutionOutcome::NoHits => stats.no_hits += 1,
            ResolutionOutcome::ManualReviewRequired(_)
            | ResolutionOutcome::AmbiguousPendingChoice(_) => stats.manual_review += 1,
        }

        let label = outcome.label();
        let Reconciliation {
            entry,
            mut changes,
            retyped_from,
            ..
        } = reconcile(entry, &outcome, diagnostics);
        if let Some(previous) = retyped_from {
            changes.insert(
                0,
                FieldChange {
                    field: "@type".to_string(),
                    before: Some(previous.to_string()),
                    after: Some(entry.entry_type().to_string()),
                },
            );
        }
        (entry, changes, label)
    }

    async fn lookup(
        &mut self,
        database: &dyn BibliographicDatabase,
        entry: &BibEntry,
        stats: &mut RunStats,
        diagnostics: &mut Diagnostics,
    ) -> ResolutionOutcome {
        if entry.title().is_none() {
            diagnostics.warn(
                entry.key(),
                DiagnosticKind::MissingTitle,
                "no title to search by",
            );
            return ResolutionOutcome::NoHits;
        }

        let matcher = CandidateMatcher::new(database, &self.config.ranking);
        match matcher.find_candidates(entry).await {
            Ok(candidates) => {
                let outcome = resolve(entry, candidates, diagnostics);
                settle(
                    entry,
                    outcome,
                    &mut *self.chooser,
                    self.config.interactive,
                    diagnostics,
                )
            }
            Err(e) => {
                stats.lookup_failures += 1;
                diagnostics.warn(
                    entry.key(),
                    DiagnosticKind::LookupFailure,
                    format!("{} lookup failed: {}", matcher.database_name(), e),
                );
                ResolutionOutcome::NoHits
            }
        }
    }
}

/// Replace a search hit with the database's full record when available.
async fn refresh_candidate(
    database: &dyn BibliographicDatabase,
    mut candidate: Candidate,
    key: &str,
    diagnostics: &mut Diagnostics,
) -> Candidate {
    match database.fetch_full(&candidate.record).await {
        Ok(Some(full)) => {
            tracing::debug!(key = %key, id = %candidate.record.id, "using full record");
            candidate.record.entry = full.entry;
        }
        Ok(None) => {}
        Err(e) => {
            diagnostics.warn(
                key,
                DiagnosticKind::RecordFetchFailure,
                format!(
                    "full record for {} unavailable ({}), using search data",
                    candidate.record.id, e
                ),
            );
        }
    }
    candidate
}
