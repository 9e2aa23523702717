//! Client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CompletionFuture, CompletionService, RevisionError};

pub const DEFAULT_SERVICE: &str = "deepseek";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// The base URL used for a service name when none is configured.
pub fn default_base_url(service: &str) -> String {
    format!("https://api.{}.com/v1", service.trim())
}

/// `POST {base_url}/chat/completions` with a bearer key.
pub struct OpenAiCompatible {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiCompatible {
    pub fn new(service: &str, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: default_base_url(service),
            model: model.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn post(&self, system_prompt: &str, input: &str) -> Result<String, RevisionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            temperature: 0.0,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(RevisionError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        extract_content(&body)
    }
}

impl CompletionService for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, system_prompt: &'a str, input: &'a str) -> CompletionFuture<'a> {
        Box::pin(self.post(system_prompt, input))
    }
}

/// Pull the first choice's message text out of a response body.
pub fn extract_content(body: &str) -> Result<String, RevisionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| RevisionError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(RevisionError::Empty)
}

fn map_reqwest_error(e: reqwest::Error) -> RevisionError {
    if e.is_timeout() {
        RevisionError::Timeout
    } else {
        RevisionError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_service_name() {
        let client = OpenAiCompatible::new(DEFAULT_SERVICE, DEFAULT_MODEL, "key");
        assert_eq!(client.endpoint(), "https://api.deepseek.com/v1/chat/completions");
        let custom = client.with_base_url("http://localhost:8080/v1/");
        assert_eq!(custom.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn timeout_defaults_to_a_minute() {
        let client = OpenAiCompatible::new(DEFAULT_SERVICE, DEFAULT_MODEL, "key");
        assert_eq!(client.timeout, Duration::from_secs(60));
        let client = client.with_timeout(Duration::from_secs(5));
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn extract_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Neurocomputing"}}]}"#;
        assert_eq!(extract_content(body), Ok("Neurocomputing".to_string()));
    }

    #[test]
    fn extract_empty_or_malformed() {
        assert_eq!(extract_content(r#"{"choices":[]}"#), Err(RevisionError::Empty));
        assert_eq!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(RevisionError::Empty)
        );
        assert!(matches!(extract_content("<html>"), Err(RevisionError::Malformed(_))));
    }
}
