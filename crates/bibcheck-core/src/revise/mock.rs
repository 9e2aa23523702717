use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CompletionFuture, CompletionService, RevisionError};

/// Canned completion service for tests.
///
/// Replies are keyed by the exact input text. Inputs without a registered
/// reply are echoed back unchanged, or fail with the configured error.
pub struct MockCompletion {
    replies: HashMap<String, Result<String, RevisionError>>,
    fallback: Option<RevisionError>,
    calls: Arc<AtomicUsize>,
}

impl MockCompletion {
    /// Echo every unregistered input.
    pub fn echo() -> Self {
        Self {
            replies: HashMap::new(),
            fallback: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every unregistered input with `error`.
    pub fn failing(error: RevisionError) -> Self {
        Self {
            fallback: Some(error),
            ..Self::echo()
        }
    }

    pub fn with_reply(
        mut self,
        input: impl Into<String>,
        reply: Result<String, RevisionError>,
    ) -> Self {
        self.replies.insert(input.into(), reply);
        self
    }

    /// Shared handle on the number of `complete()` calls, usable after the
    /// mock has been moved into an adapter.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl CompletionService for MockCompletion {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete<'a>(&'a self, _system_prompt: &'a str, input: &'a str) -> CompletionFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = match self.replies.get(input) {
            Some(reply) => reply.clone(),
            None => match &self.fallback {
                Some(e) => Err(e.clone()),
                None => Ok(input.to_string()),
            },
        };
        Box::pin(async move { reply })
    }
}
