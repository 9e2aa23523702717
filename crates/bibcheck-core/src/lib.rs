use thiserror::Error;

pub mod authors;
pub mod config_file;
pub mod db;
pub mod diagnostics;
pub mod entry;
pub mod matcher;
pub mod matching;
pub mod pipeline;
pub mod reconcile;
pub mod resolver;
pub mod revise;
pub mod schema;
pub mod validate;

// Re-export for convenience
pub use db::{BibliographicDatabase, LookupError, LookupFuture, RemoteRecord, SourceType};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use entry::{BibEntry, EntryType};
pub use matcher::{Candidate, CandidateMatcher, Candidates, MatchScore, RankingPolicy};
pub use pipeline::{Pipeline, ProgressEvent, RunReport, RunStats};
pub use reconcile::{FieldChange, Reconciliation};
pub use resolver::{Choice, Chooser, DeclineAll, ManualReviewReason, ResolutionOutcome};
pub use revise::{CompletionService, RevisableField, RevisionAdapter, RevisionError, RevisionPolicy};
pub use schema::TypeSchema;
pub use validate::{Validation, validate};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] config_file::ConfigError),
    #[error("AI revision needs an API key (--ai-key or BIBCHECK_AI_KEY)")]
    MissingApiKey,
}

/// Connection settings for the DBLP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DblpSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Hits requested per search.
    pub max_hits: usize,
    pub requests_per_second: u32,
}

impl Default for DblpSettings {
    fn default() -> Self {
        Self {
            base_url: "https://dblp.org".to_string(),
            timeout_secs: 10,
            max_hits: 100,
            requests_per_second: 1,
        }
    }
}

/// Which completion service to revise with.
#[derive(Clone, PartialEq, Eq)]
pub struct AiSettings {
    pub service: String,
    pub model: String,
    /// Overrides `https://api.{service}.com/v1`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Per-request timeout for completion calls.
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            service: revise::openai::DEFAULT_SERVICE.to_string(),
            model: revise::openai::DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiSettings")
            .field("service", &self.service)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AiSettings {
    /// Build the completion client, failing when no key is configured.
    pub fn client(&self) -> Result<revise::OpenAiCompatible, CoreError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CoreError::MissingApiKey)?;
        let client = revise::OpenAiCompatible::new(&self.service, self.model.clone(), key)
            .with_timeout(std::time::Duration::from_secs(self.timeout_secs));
        Ok(match &self.base_url {
            Some(url) => client.with_base_url(url.clone()),
            None => client,
        })
    }
}

/// Runtime configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub use_dblp: bool,
    pub use_ai: bool,
    /// Report unrecognized entry types as warnings and keep going.
    pub suppress_type: bool,
    /// Ask a human to pick among several candidates.
    pub interactive: bool,
    /// Replace search hits with the full exported record before merging.
    pub fetch_full_records: bool,
    pub ranking: RankingPolicy,
    pub revision: RevisionPolicy,
    pub dblp: DblpSettings,
    pub ai: AiSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_dblp: false,
            use_ai: false,
            suppress_type: false,
            interactive: true,
            fetch_full_records: true,
            ranking: RankingPolicy::default(),
            revision: RevisionPolicy::default(),
            dblp: DblpSettings::default(),
            ai: AiSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_client_requires_key() {
        let settings = AiSettings::default();
        assert!(matches!(settings.client(), Err(CoreError::MissingApiKey)));

        let settings = AiSettings {
            api_key: Some("sk-test".into()),
            base_url: Some("http://localhost:1234/v1".into()),
            ..AiSettings::default()
        };
        let client = settings.client().unwrap();
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn debug_redacts_api_key() {
        let settings = AiSettings {
            api_key: Some("sk-secret".into()),
            ..AiSettings::default()
        };
        let shown = format!("{:?}", settings);
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("***"));
    }
}
