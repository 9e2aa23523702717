//! In-memory database backend for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BibliographicDatabase, LookupError, LookupFuture, RemoteRecord, SourceType};
use crate::entry::{BibEntry, EntryType};

/// A configurable response for [`MockDatabase`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return these records.
    Records(Vec<RemoteRecord>),
    /// Fail the lookup.
    Error(LookupError),
}

/// A hand-rolled mock implementing [`BibliographicDatabase`].
///
/// Responses are consumed in call order; once the sequence is exhausted the
/// fallback is returned for every further call. Full-record fetches are
/// answered from a map keyed by record id.
pub struct MockDatabase {
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    full_records: HashMap<String, Result<RemoteRecord, LookupError>>,
    queries: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl MockDatabase {
    /// A mock that answers every query with `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            full_records: HashMap::new(),
            queries: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// A mock that answers queries in order, then returns no records.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            ..Self::new(MockResponse::Records(Vec::new()))
        }
    }

    /// Register the full-record answer for a record id.
    pub fn with_full_record(
        mut self,
        id: impl Into<String>,
        record: Result<RemoteRecord, LookupError>,
    ) -> Self {
        self.full_records.insert(id.into(), record);
        self
    }

    /// How many times `search()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    fn next_response(&self) -> MockResponse {
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl BibliographicDatabase for MockDatabase {
    fn name(&self) -> &str {
        "mock"
    }

    fn search<'a>(&'a self, query: &'a str) -> LookupFuture<'a, Vec<RemoteRecord>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        let response = self.next_response();
        Box::pin(async move {
            match response {
                MockResponse::Records(records) => Ok(records),
                MockResponse::Error(e) => Err(e),
            }
        })
    }

    fn fetch_full<'a>(&'a self, record: &'a RemoteRecord) -> LookupFuture<'a, Option<RemoteRecord>> {
        let answer = self.full_records.get(&record.id).cloned();
        Box::pin(async move {
            match answer {
                Some(Ok(full)) => Ok(Some(full)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        })
    }
}

/// Build a remote record from `(field, value)` pairs.
///
/// The entry type follows the source type the way DBLP exports records:
/// journals and informal publications as `@article`, conferences as
/// `@inproceedings`, anything else as `@misc`.
pub fn record(id: &str, source_type: SourceType, fields: &[(&str, &str)]) -> RemoteRecord {
    let entry_type = match source_type {
        SourceType::Journal | SourceType::Informal => EntryType::Article,
        SourceType::Conference => EntryType::InProceedings,
        SourceType::Other => EntryType::Other("misc".into()),
    };
    let mut entry = BibEntry::new(entry_type, id);
    for (name, value) in fields {
        entry.set(name, *value);
    }
    RemoteRecord {
        id: id.to_string(),
        source_type,
        entry,
        export_url: None,
    }
}
