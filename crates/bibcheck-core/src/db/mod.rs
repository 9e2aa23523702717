//! Bibliographic database boundary: the trait a remote source implements and
//! the record shape it returns.

pub mod mock;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::entry::{BibEntry, EntryType};

/// Publication class declared by the remote database for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Journal,
    Conference,
    Informal,
    Other,
}

impl SourceType {
    /// Journal and conference records are trusted for automatic merging.
    pub fn is_authoritative(self) -> bool {
        matches!(self, SourceType::Journal | SourceType::Conference)
    }

    /// Whether this source type corresponds to the given local entry type.
    pub fn matches_entry_type(self, entry_type: &EntryType) -> bool {
        matches!(
            (self, entry_type),
            (SourceType::Journal, EntryType::Article)
                | (SourceType::Conference, EntryType::InProceedings)
                | (SourceType::Informal, EntryType::Preprint(_))
        )
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceType::Journal => "journal",
            SourceType::Conference => "conference",
            SourceType::Informal => "informal",
            SourceType::Other => "other",
        })
    }
}

/// A record returned by a database search.
///
/// `entry` holds the record in entry form; its key is the database's own
/// identifier and is never copied onto a local entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: String,
    pub source_type: SourceType,
    pub entry: BibEntry,
    /// Where the full record can be exported from, if the database offers it.
    pub export_url: Option<String>,
}

/// Errors from querying a bibliographic database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited (429)")]
    RateLimited { retry_after: Option<Duration> },
    #[error("HTTP {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type LookupFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LookupError>> + Send + 'a>>;

/// A remote source of authoritative bibliographic records.
pub trait BibliographicDatabase: Send + Sync {
    /// The canonical name of this database (e.g. "DBLP").
    fn name(&self) -> &str;

    /// Search for records matching a free-text query.
    fn search<'a>(&'a self, query: &'a str) -> LookupFuture<'a, Vec<RemoteRecord>>;

    /// Fetch the full form of a record found by [`search`](Self::search).
    ///
    /// Databases whose search results are already complete return `Ok(None)`.
    fn fetch_full<'a>(&'a self, _record: &'a RemoteRecord) -> LookupFuture<'a, Option<RemoteRecord>> {
        Box::pin(async { Ok(None) })
    }
}
