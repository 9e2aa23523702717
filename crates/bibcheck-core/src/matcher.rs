//! Candidate search and ranking.
//!
//! One query per entry goes to the database; the returned records are scored
//! against the local entry, filtered, and ranked best first.

use std::cmp::Ordering;

use crate::authors::author_overlap;
use crate::db::{BibliographicDatabase, LookupError, RemoteRecord, SourceType};
use crate::entry::BibEntry;
use crate::matching::{get_query_words, title_similarity};

/// Scores closer than this are treated as tied.
const SCORE_EPSILON: f64 = 1e-6;

/// Tunable ranking policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingPolicy {
    pub title_weight: f64,
    pub author_weight: f64,
    /// Candidates scoring below this are dropped.
    pub min_score: f64,
    pub max_candidates: usize,
    /// Number of significant title words sent as the query.
    pub query_words: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            title_weight: 0.8,
            author_weight: 0.2,
            min_score: 0.75,
            max_candidates: 10,
            query_words: 8,
        }
    }
}

/// How well a candidate matches the local entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    pub title: f64,
    /// `None` when the local entry has no usable author names.
    pub authors: Option<f64>,
    pub combined: f64,
}

impl MatchScore {
    pub fn compute(local: &BibEntry, remote: &BibEntry, policy: &RankingPolicy) -> Self {
        let title = match (local.title(), remote.title()) {
            (Some(a), Some(b)) => title_similarity(a, b),
            _ => 0.0,
        };
        let authors = author_overlap(&local.authors(), &remote.authors());
        let combined = match authors {
            Some(overlap) => {
                let total = policy.title_weight + policy.author_weight;
                if total > 0.0 {
                    (policy.title_weight * title + policy.author_weight * overlap) / total
                } else {
                    title
                }
            }
            None => title,
        };
        Self {
            title,
            authors,
            combined,
        }
    }
}

/// A remote record scored against one local entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: RemoteRecord,
    pub score: MatchScore,
}

impl Candidate {
    pub fn source_type(&self) -> SourceType {
        self.record.source_type
    }

    pub fn entry(&self) -> &BibEntry {
        &self.record.entry
    }

    /// One-line description used in prompts and diagnostics.
    pub fn summary(&self) -> String {
        let e = &self.record.entry;
        format!(
            "{}, {}, {} [{}]",
            e.title().unwrap_or("(untitled)"),
            e.get_nonempty("year").unwrap_or("?"),
            e.venue().unwrap_or("?"),
            self.record.source_type
        )
    }
}

/// Ranked candidates for one entry, best first.
///
/// Consumed once: there is no way to rewind and the query is not repeated.
#[derive(Debug)]
pub struct Candidates {
    inner: std::vec::IntoIter<Candidate>,
}

impl Candidates {
    pub fn empty() -> Self {
        Self {
            inner: Vec::new().into_iter(),
        }
    }
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Candidates {}

/// Build the search query for an entry: the significant words of its title.
pub fn build_query(entry: &BibEntry, policy: &RankingPolicy) -> Option<String> {
    let title = entry.title()?;
    let words = get_query_words(title, policy.query_words);
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Score, filter and rank remote records against a local entry.
pub fn rank_candidates(
    local: &BibEntry,
    records: Vec<RemoteRecord>,
    policy: &RankingPolicy,
) -> Vec<Candidate> {
    let mut seen = std::collections::HashSet::new();
    let mut candidates: Vec<Candidate> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .map(|record| {
            let score = MatchScore::compute(local, &record.entry, policy);
            Candidate { record, score }
        })
        .filter(|c| c.score.combined + SCORE_EPSILON >= policy.min_score)
        .collect();

    candidates.sort_by(|a, b| compare_candidates(local, a, b));
    candidates.truncate(policy.max_candidates);
    candidates
}

/// Best-first ordering: combined score, then source type agreeing with the
/// local entry type, then journal/conference before informal/other, then the
/// more complete record.
fn compare_candidates(local: &BibEntry, a: &Candidate, b: &Candidate) -> Ordering {
    let diff = b.score.combined - a.score.combined;
    if diff.abs() > SCORE_EPSILON {
        return if diff > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let type_match = |c: &Candidate| c.source_type().matches_entry_type(local.entry_type());
    type_match(b)
        .cmp(&type_match(a))
        .then_with(|| {
            b.source_type()
                .is_authoritative()
                .cmp(&a.source_type().is_authoritative())
        })
        .then_with(|| b.entry().completeness().cmp(&a.entry().completeness()))
}

/// Queries a database and ranks what comes back.
pub struct CandidateMatcher<'a> {
    database: &'a dyn BibliographicDatabase,
    policy: &'a RankingPolicy,
}

impl<'a> CandidateMatcher<'a> {
    pub fn new(database: &'a dyn BibliographicDatabase, policy: &'a RankingPolicy) -> Self {
        Self { database, policy }
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Look up candidates for an entry with one database round trip.
    ///
    /// Entries without a searchable title yield no candidates and make no
    /// request. Lookup errors are returned to the caller, not retried.
    pub async fn find_candidates(&self, entry: &BibEntry) -> Result<Candidates, LookupError> {
        let Some(query) = build_query(entry, self.policy) else {
            return Ok(Candidates::empty());
        };

        tracing::debug!(key = %entry.key(), db = self.database.name(), query = %query, "searching");
        let records = self.database.search(&query).await?;
        let total = records.len();
        let ranked = rank_candidates(entry, records, self.policy);
        tracing::debug!(
            key = %entry.key(),
            hits = total,
            kept = ranked.len(),
            "ranked candidates"
        );

        Ok(Candidates {
            inner: ranked.into_iter(),
        })
    }
}
