//! Disambiguation policy: turn ranked candidates into a single outcome.
//!
//! Resolution is a two-step state machine. [`resolve`] is pure and terminal
//! for zero or one candidate; with several candidates it yields
//! [`ResolutionOutcome::AmbiguousPendingChoice`], which [`settle`] turns into
//! a final outcome by asking a [`Chooser`]. That call is the only place the
//! run waits for a human.

use std::fmt;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::entry::BibEntry;
use crate::matcher::Candidate;

/// Why an entry could not be reconciled automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualReviewReason {
    /// The only candidate is an informal or other-type record.
    InformalSingleHit,
    /// The human rejected every candidate.
    NoneChosen,
    /// Several candidates and nobody to ask.
    NonInteractive { candidates: usize },
}

impl fmt::Display for ManualReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualReviewReason::InformalSingleHit => f.write_str("type=misc"),
            ManualReviewReason::NoneChosen => f.write_str("no candidate chosen"),
            ManualReviewReason::NonInteractive { candidates } => {
                write!(f, "{} candidates, not prompting", candidates)
            }
        }
    }
}

/// The result of resolving one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Matched(Candidate),
    NoHits,
    AmbiguousPendingChoice(Vec<Candidate>),
    ManualReviewRequired(ManualReviewReason),
}

impl ResolutionOutcome {
    /// Short label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionOutcome::Matched(_) => "matched",
            ResolutionOutcome::NoHits => "no hits",
            ResolutionOutcome::AmbiguousPendingChoice(_) => "ambiguous",
            ResolutionOutcome::ManualReviewRequired(_) => "manual review",
        }
    }
}

/// A human's answer to an ambiguous match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Index into the candidate list as presented.
    Pick(usize),
    NoneOfThese,
}

/// Something that can pick among ranked candidates, usually a person at a
/// terminal. Blocks until an answer is available.
pub trait Chooser {
    fn choose(&mut self, entry: &BibEntry, candidates: &[Candidate]) -> Choice;
}

/// A chooser that never picks, for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineAll;

impl Chooser for DeclineAll {
    fn choose(&mut self, _entry: &BibEntry, _candidates: &[Candidate]) -> Choice {
        Choice::NoneOfThese
    }
}

/// First resolution step. Terminal for zero or one candidate.
pub fn resolve(
    entry: &BibEntry,
    candidates: impl Iterator<Item = Candidate>,
    diagnostics: &mut Diagnostics,
) -> ResolutionOutcome {
    let mut candidates: Vec<Candidate> = candidates.collect();
    let key = entry.key();

    match candidates.len() {
        0 => {
            diagnostics.warn(key, DiagnosticKind::NoMatch, "no hits in the database");
            ResolutionOutcome::NoHits
        }
        1 => {
            let candidate = candidates.remove(0);
            if candidate.source_type().is_authoritative() {
                ResolutionOutcome::Matched(candidate)
            } else {
                diagnostics.warn(
                    key,
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "only hit is a {} record, check manually: {}",
                        candidate.source_type(),
                        candidate.summary()
                    ),
                );
                ResolutionOutcome::ManualReviewRequired(ManualReviewReason::InformalSingleHit)
            }
        }
        _ => ResolutionOutcome::AmbiguousPendingChoice(candidates),
    }
}

/// Second resolution step: settle an ambiguous outcome.
///
/// With `interactive` unset the chooser is not consulted and the entry is
/// sent to manual review. Outcomes other than
/// [`ResolutionOutcome::AmbiguousPendingChoice`] pass through unchanged.
pub fn settle(
    entry: &BibEntry,
    outcome: ResolutionOutcome,
    chooser: &mut dyn Chooser,
    interactive: bool,
    diagnostics: &mut Diagnostics,
) -> ResolutionOutcome {
    let ResolutionOutcome::AmbiguousPendingChoice(mut candidates) = outcome else {
        return outcome;
    };
    let key = entry.key();

    if !interactive {
        let reason = ManualReviewReason::NonInteractive {
            candidates: candidates.len(),
        };
        diagnostics.warn(
            key,
            DiagnosticKind::ManualReview,
            format!("multiple hits ({}), resolve manually", candidates.len()),
        );
        return ResolutionOutcome::ManualReviewRequired(reason);
    }

    match chooser.choose(entry, &candidates) {
        Choice::Pick(i) if i < candidates.len() => {
            let chosen = candidates.swap_remove(i);
            diagnostics.info(
                key,
                DiagnosticKind::AmbiguousMatch,
                format!("chose {}", chosen.summary()),
            );
            ResolutionOutcome::Matched(chosen)
        }
        Choice::Pick(_) | Choice::NoneOfThese => {
            diagnostics.warn(
                key,
                DiagnosticKind::ManualReview,
                format!(
                    "none of {} candidates accepted, resolve manually",
                    candidates.len()
                ),
            );
            ResolutionOutcome::ManualReviewRequired(ManualReviewReason::NoneChosen)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SourceType;
    use crate::db::mock::record;
    use crate::entry::EntryType;
    use crate::matcher::MatchScore;

    fn candidate(id: &str, source_type: SourceType) -> Candidate {
        Candidate {
            record: record(id, source_type, &[("title", "T")]),
            score: MatchScore {
                title: 1.0,
                authors: None,
                combined: 1.0,
            },
        }
    }

    fn entry() -> BibEntry {
        BibEntry::new(EntryType::Article, "k")
    }

    struct Scripted(Choice, usize);

    impl Chooser for Scripted {
        fn choose(&mut self, _entry: &BibEntry, _candidates: &[Candidate]) -> Choice {
            self.1 += 1;
            self.0
        }
    }

    #[test]
    fn zero_candidates_is_no_hits() {
        let mut diags = Diagnostics::new();
        let outcome = resolve(&entry(), std::iter::empty(), &mut diags);
        assert_eq!(outcome, ResolutionOutcome::NoHits);
        assert_eq!(diags.iter().next().unwrap().kind, DiagnosticKind::NoMatch);
    }

    #[test]
    fn single_conference_hit_is_matched() {
        let mut diags = Diagnostics::new();
        let c = candidate("a", SourceType::Conference);
        let outcome = resolve(&entry(), vec![c.clone()].into_iter(), &mut diags);
        assert_eq!(outcome, ResolutionOutcome::Matched(c));
        assert!(diags.is_empty());
    }

    #[test]
    fn single_informal_hit_needs_review() {
        for source in [SourceType::Informal, SourceType::Other] {
            let mut diags = Diagnostics::new();
            let outcome = resolve(&entry(), vec![candidate("a", source)].into_iter(), &mut diags);
            assert_eq!(
                outcome,
                ResolutionOutcome::ManualReviewRequired(ManualReviewReason::InformalSingleHit)
            );
            assert_eq!(diags.iter().next().unwrap().kind, DiagnosticKind::TypeMismatch);
        }
        assert_eq!(ManualReviewReason::InformalSingleHit.to_string(), "type=misc");
    }

    #[test]
    fn several_candidates_wait_for_a_choice() {
        let mut diags = Diagnostics::new();
        let cs = vec![
            candidate("a", SourceType::Conference),
            candidate("b", SourceType::Informal),
        ];
        let outcome = resolve(&entry(), cs.clone().into_iter(), &mut diags);
        assert_eq!(outcome, ResolutionOutcome::AmbiguousPendingChoice(cs));
    }

    #[test]
    fn settle_applies_the_pick() {
        let mut diags = Diagnostics::new();
        let cs = vec![
            candidate("a", SourceType::Conference),
            candidate("b", SourceType::Informal),
        ];
        let mut chooser = Scripted(Choice::Pick(1), 0);
        let outcome = settle(
            &entry(),
            ResolutionOutcome::AmbiguousPendingChoice(cs.clone()),
            &mut chooser,
            true,
            &mut diags,
        );
        assert_eq!(outcome, ResolutionOutcome::Matched(cs[1].clone()));
        assert_eq!(chooser.1, 1);
        assert!(!diags.has_blocking());
    }

    #[test]
    fn settle_none_or_out_of_range_needs_review() {
        for choice in [Choice::NoneOfThese, Choice::Pick(7)] {
            let mut diags = Diagnostics::new();
            let cs = vec![candidate("a", SourceType::Journal), candidate("b", SourceType::Journal)];
            let outcome = settle(
                &entry(),
                ResolutionOutcome::AmbiguousPendingChoice(cs),
                &mut Scripted(choice, 0),
                true,
                &mut diags,
            );
            assert_eq!(
                outcome,
                ResolutionOutcome::ManualReviewRequired(ManualReviewReason::NoneChosen)
            );
        }
    }

    #[test]
    fn settle_non_interactive_never_asks() {
        let mut diags = Diagnostics::new();
        let cs = vec![candidate("a", SourceType::Journal), candidate("b", SourceType::Journal)];
        let mut chooser = Scripted(Choice::Pick(0), 0);
        let outcome = settle(
            &entry(),
            ResolutionOutcome::AmbiguousPendingChoice(cs),
            &mut chooser,
            false,
            &mut diags,
        );
        assert_eq!(
            outcome,
            ResolutionOutcome::ManualReviewRequired(ManualReviewReason::NonInteractive {
                candidates: 2
            })
        );
        assert_eq!(chooser.1, 0);
    }

    #[test]
    fn settle_passes_terminal_outcomes_through() {
        let mut diags = Diagnostics::new();
        let outcome = settle(
            &entry(),
            ResolutionOutcome::NoHits,
            &mut DeclineAll,
            true,
            &mut diags,
        );
        assert_eq!(outcome, ResolutionOutcome::NoHits);
        assert!(diags.is_empty());
    }
}
