//! DBLP lookup backend: free-text publication search plus BibTeX export of
//! individual records.

pub mod parse;
pub mod rate_limit;

use std::time::Duration;

use bibcheck_core::db::{BibliographicDatabase, LookupError, LookupFuture, RemoteRecord};
use bibcheck_core::DblpSettings;

use crate::rate_limit::{RequestPacer, check_status};

const USER_AGENT: &str = concat!("bib-check/", env!("CARGO_PKG_VERSION"));

/// Client for the public DBLP API.
pub struct DblpClient {
    client: reqwest::Client,
    base_url: String,
    max_hits: usize,
    timeout: Duration,
    pacer: RequestPacer,
}

impl DblpClient {
    pub fn new(settings: &DblpSettings) -> Result<Self, LookupError> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_hits: settings.max_hits.max(1),
            timeout,
            pacer: RequestPacer::per_second(settings.requests_per_second, timeout),
        })
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search/publ/api?q={}&format=json&h={}",
            self.base_url,
            urlencoding::encode(query),
            self.max_hits
        )
    }

    /// GET `url` as text. A 429 is returned as an error and delays every
    /// later request; the request itself is not sent again.
    async fn get_text(&self, url: &str) -> Result<String, LookupError> {
        self.pacer.acquire().await;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match check_status(resp.status(), resp.headers()) {
            Ok(()) => resp.text().await.map_err(map_reqwest_error),
            Err(LookupError::RateLimited { retry_after }) => {
                let delay = self.pacer.hold_off(retry_after);
                tracing::warn!(url, delay_ms = delay.as_millis() as u64, "DBLP rate limited, holding off");
                Err(LookupError::RateLimited { retry_after })
            }
            Err(e) => Err(e),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout
    } else if e.is_decode() {
        LookupError::Malformed(e.to_string())
    } else {
        LookupError::Transport(e.to_string())
    }
}

impl BibliographicDatabase for DblpClient {
    fn name(&self) -> &str {
        "DBLP"
    }

    fn search<'a>(&'a self, query: &'a str) -> LookupFuture<'a, Vec<RemoteRecord>> {
        Box::pin(async move {
            let url = self.search_url(query);
            tracing::debug!(query, "DBLP search");
            let body = self.get_text(&url).await?;
            let records = parse::parse_search_response(&body)?;
            tracing::debug!(query, hits = records.len(), "DBLP search done");
            Ok(records)
        })
    }

    fn fetch_full<'a>(&'a self, record: &'a RemoteRecord) -> LookupFuture<'a, Option<RemoteRecord>> {
        Box::pin(async move {
            let Some(url) = record.export_url.as_deref() else {
                return Ok(None);
            };
            let body = self.get_text(url).await?;
            let exported = bibcheck_bib::parse_single(&body)
                .map_err(|e| LookupError::Malformed(format!("{}: {}", url, e)))?;
            Ok(Some(parse::full_record(record, exported)))
        })
    }
}
