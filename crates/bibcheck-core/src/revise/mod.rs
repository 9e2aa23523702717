//! Optional rewriting of free-text fields by an AI completion service.
//!
//! Only `title`, `journal` and `booktitle` are ever sent. Each response has to
//! pass [`accept_revision`] before it replaces the original value; anything
//! else keeps the original and leaves a diagnostic.

pub mod mock;
pub mod openai;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::entry::{BibEntry, EntryType};
use crate::reconcile::FieldChange;

pub use mock::MockCompletion;
pub use openai::OpenAiCompatible;

const TITLE_PROMPT: &str = "\
You are given the title of a bibtex entry. Rewrite it in title case.
Words that must keep their capitalization (abbreviations such as LLM, proper
nouns, system or project names) are wrapped in braces, e.g. {LLM}, with the
correct casing inside. Text already inside braces stays unchanged.
Output only the new title on a single line, nothing else.

Examples:
{RoFormer}: Enhanced Transformer with Rotary Position Embedding
{SGLang}: Efficient Execution of Structured Language Model Programs
{CacheBlend}: Fast Large Language Model Serving for {RAG} with Cached Knowledge Fusion
{H2O:} Heavy-Hitter Oracle for Efficient Generative Inference of Large Language Models";

const JOURNAL_PROMPT: &str = "\
You are given the journal name of a bibtex entry. Fix its capitalization
following the journal's own convention. Use the full name only, with no
abbreviation and no year.
Output only the new name on a single line, nothing else.

Examples:
CoRR
Neurocomputing
Transactions of the Association for Computational Linguistics";

const BOOKTITLE_PROMPT: &str = "\
You are given the proceedings name (the booktitle) of a bibtex entry. Fix its
capitalization following the conference's own convention and make sure it
starts with \"Proceedings of\". Use the full name only, with no abbreviation
and no year. Spell ordinals out (\"Forty-First\", not \"41st\").
Output only the new name on a single line, nothing else.

Examples:
Proceedings of the Tenth International Conference on Learning Representations
Proceedings of the Advances in Neural Information Processing Systems
Proceedings of the Twenty-Ninth Symposium on Operating Systems Principles
Proceedings of the Twenty-Third {USENIX} Conference on File and Storage Technologies
Proceedings of the Forty-First International Conference on Machine Learning";

/// A field the revision pass may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevisableField {
    Title,
    Journal,
    BookTitle,
}

impl RevisableField {
    pub const ALL: [RevisableField; 3] = [
        RevisableField::Title,
        RevisableField::Journal,
        RevisableField::BookTitle,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            RevisableField::Title => "title",
            RevisableField::Journal => "journal",
            RevisableField::BookTitle => "booktitle",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            RevisableField::Title => TITLE_PROMPT,
            RevisableField::Journal => JOURNAL_PROMPT,
            RevisableField::BookTitle => BOOKTITLE_PROMPT,
        }
    }

    /// Venue fields are only revised on the type that owns them.
    pub fn applies_to(self, entry_type: &EntryType) -> bool {
        match self {
            RevisableField::Title => true,
            RevisableField::Journal => *entry_type == EntryType::Article,
            RevisableField::BookTitle => *entry_type == EntryType::InProceedings,
        }
    }
}

impl fmt::Display for RevisableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for RevisableField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(RevisableField::Title),
            "journal" => Ok(RevisableField::Journal),
            "booktitle" => Ok(RevisableField::BookTitle),
            other => Err(format!("field `{}` cannot be revised", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevisionError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response")]
    Empty,
    #[error("response rejected: {0}")]
    Rejected(String),
}

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String, RevisionError>> + Send + 'a>>;

/// A chat-completion style text service.
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    /// Complete `input` under `system_prompt`, returning the raw reply text.
    fn complete<'a>(&'a self, system_prompt: &'a str, input: &'a str) -> CompletionFuture<'a>;
}

/// Which fields to revise and how far a reply may stray from the original.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionPolicy {
    pub fields: Vec<RevisableField>,
    /// Upper and lower length bound as a ratio of the original length.
    pub max_length_ratio: f64,
    /// Extra characters allowed above the original length for short values.
    pub length_slack: usize,
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        Self {
            fields: RevisableField::ALL.to_vec(),
            max_length_ratio: 3.0,
            length_slack: 80,
        }
    }
}

/// Check a service reply before it replaces `original`.
///
/// The reply is trimmed and must be non-empty, a single line, and within
/// `[len / ratio, max(len * ratio, len + slack)]` characters of the original.
pub fn accept_revision(
    original: &str,
    reply: &str,
    policy: &RevisionPolicy,
) -> Result<String, RevisionError> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(RevisionError::Empty);
    }
    if reply.contains(['\n', '\r']) {
        return Err(RevisionError::Rejected("multi-line reply".into()));
    }

    let ratio = policy.max_length_ratio.max(1.0);
    let len = original.chars().count() as f64;
    let got = reply.chars().count() as f64;
    let lower = len / ratio;
    let upper = (len * ratio).max(len + policy.length_slack as f64);
    if got < lower || got > upper {
        return Err(RevisionError::Rejected(format!(
            "length {} outside [{:.0}, {:.0}]",
            got, lower, upper
        )));
    }
    Ok(reply.to_string())
}

/// Drives a [`CompletionService`] over the revisable fields of an entry.
pub struct RevisionAdapter {
    service: Box<dyn CompletionService>,
    policy: RevisionPolicy,
}

impl RevisionAdapter {
    pub fn new(service: Box<dyn CompletionService>, policy: RevisionPolicy) -> Self {
        Self { service, policy }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn policy(&self) -> &RevisionPolicy {
        &self.policy
    }

    /// Revise each applicable field independently. A failure on one field
    /// keeps that field's original value and does not affect the others.
    pub async fn revise(&self, entry: &mut BibEntry, diagnostics: &mut Diagnostics) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        for field in &self.policy.fields {
            if !field.applies_to(entry.entry_type()) {
                continue;
            }
            let name = field.field_name();
            let Some(original) = entry.get_nonempty(name).map(str::to_string) else {
                continue;
            };

            let result = match self.service.complete(field.system_prompt(), &original).await {
                Ok(reply) => accept_revision(&original, &reply, &self.policy),
                Err(e) => Err(e),
            };

            match result {
                Ok(revised) if revised == original => {}
                Ok(revised) => {
                    tracing::info!(key = %entry.key(), field = name, from = %original, to = %revised, "revised");
                    entry.set(name, revised.clone());
                    changes.push(FieldChange {
                        field: name.to_string(),
                        before: Some(original),
                        after: Some(revised),
                    });
                }
                Err(e) => {
                    diagnostics.warn(
                        entry.key(),
                        DiagnosticKind::RevisionServiceFailure {
                            field: name.to_string(),
                        },
                        format!("{} revision via {} failed: {}", name, self.service.name(), e),
                    );
                }
            }
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_trims_and_bounds() {
        let policy = RevisionPolicy::default();
        assert_eq!(
            accept_revision("attention is all you need", "  Attention Is All You Need \n", &policy),
            Ok("Attention Is All You Need".to_string())
        );
        assert_eq!(accept_revision("x", "   ", &policy), Err(RevisionError::Empty));
        assert!(matches!(
            accept_revision("a title", "line one\nline two", &policy),
            Err(RevisionError::Rejected(_))
        ));
        // Too short: 30 chars against a 100-char original with ratio 3.
        let long = "a".repeat(100);
        assert!(accept_revision(&long, &"b".repeat(30), &policy).is_err());
        assert!(accept_revision(&long, &"b".repeat(34), &policy).is_ok());
    }

    #[test]
    fn short_values_get_slack() {
        let policy = RevisionPolicy::default();
        let expanded = "Proceedings of the Advances in Neural Information Processing Systems";
        assert!(accept_revision("NeurIPS", expanded, &policy).is_ok());
        assert!(accept_revision("NeurIPS", &"x".repeat(88), &policy).is_err());
    }

    #[test]
    fn venue_fields_follow_type() {
        assert!(RevisableField::Journal.applies_to(&EntryType::Article));
        assert!(!RevisableField::Journal.applies_to(&EntryType::InProceedings));
        assert!(RevisableField::BookTitle.applies_to(&EntryType::InProceedings));
        assert!(RevisableField::Title.applies_to(&EntryType::Preprint("misc".into())));
    }

    #[test]
    fn parse_field_names() {
        assert_eq!("BookTitle".parse::<RevisableField>(), Ok(RevisableField::BookTitle));
        assert!("author".parse::<RevisableField>().is_err());
    }

    #[tokio::test]
    async fn revise_applies_accepted_and_reports_failed() {
        let service = MockCompletion::echo()
            .with_reply("attention is all you need", Ok("Attention Is All You Need".into()))
            .with_reply("neurips", Err(RevisionError::Timeout));
        let adapter = RevisionAdapter::new(Box::new(service), RevisionPolicy::default());

        let mut entry = BibEntry::new(EntryType::InProceedings, "k")
            .with_field("title", "attention is all you need")
            .with_field("booktitle", "neurips")
            .with_field("journal", "ignored for inproceedings");
        let mut diags = Diagnostics::new();
        let changes = adapter.revise(&mut entry, &mut diags).await;

        assert_eq!(changes.len(), 1);
        assert_eq!(entry.get("title"), Some("Attention Is All You Need"));
        assert_eq!(entry.get("booktitle"), Some("neurips"));
        assert_eq!(entry.get("journal"), Some("ignored for inproceedings"));
        let d = diags.iter().next().unwrap();
        assert_eq!(
            d.kind,
            DiagnosticKind::RevisionServiceFailure {
                field: "booktitle".into()
            }
        );
    }

    #[tokio::test]
    async fn revise_skips_unselected_fields() {
        let service = MockCompletion::echo().with_reply("t", Ok("T".into()));
        let calls = service.call_counter();
        let policy = RevisionPolicy {
            fields: vec![RevisableField::Journal],
            ..RevisionPolicy::default()
        };
        let adapter = RevisionAdapter::new(Box::new(service), policy);
        let mut entry = BibEntry::new(EntryType::Article, "k").with_field("title", "t");
        let changes = adapter.revise(&mut entry, &mut Diagnostics::new()).await;
        assert!(changes.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
