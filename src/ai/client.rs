use super::{ChatApiError, ChatResult, QuestionBackend};
use crate::config::AppConfig;
use crate::types::SendOptions;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

const DEFAULT_USE_CACHE: bool = true;
const DEFAULT_USE_HYBRID: bool = false;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
    pub use_cache: Option<bool>,
    pub use_hybrid: Option<bool>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            use_cache: None,
            use_hybrid: None,
        }
    }

    pub fn with_options(mut self, options: SendOptions) -> Self {
        self.use_cache = options.use_cache;
        self.use_hybrid = options.use_hybrid;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct AskPayload<'a> {
    question: &'a str,
    use_cache: bool,
    use_hybrid: bool,
}

/// HTTP client for the question-answering endpoint
#[derive(Clone)]
pub struct QuestionClient {
    client: Client,
    endpoint: String,
}

impl QuestionClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.endpoint.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask a single question.
    ///
    /// A cancelled call resolves to a transport error; callers holding the token
    /// are expected to check it and drop the result.
    pub async fn ask(
        &self,
        request: &AskRequest,
        cancel: Option<&CancellationToken>,
    ) -> ChatResult<AskResponse> {
        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("question cancelled before the endpoint answered");
                    Err(ChatApiError::transport(Cancelled))
                }
                result = self.execute(request) => result,
            },
            None => self.execute(request).await,
        }
    }

    async fn execute(&self, request: &AskRequest) -> ChatResult<AskResponse> {
        let payload = AskPayload {
            question: &request.question,
            use_cache: request.use_cache.unwrap_or(DEFAULT_USE_CACHE),
            use_hybrid: request.use_hybrid.unwrap_or(DEFAULT_USE_HYBRID),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(ChatApiError::transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ChatApiError::transport)?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "question endpoint returned an error");
            return Err(ChatApiError::from_http(status.as_u16(), &body));
        }

        parse_answer(&body)
    }
}

#[async_trait]
impl QuestionBackend for QuestionClient {
    async fn ask(
        &self,
        request: AskRequest,
        cancel: &CancellationToken,
    ) -> ChatResult<AskResponse> {
        QuestionClient::ask(self, &request, Some(cancel)).await
    }
}

/// Validate a successful response body. The source list must be present and be a list of strings.
pub fn parse_answer(body: &str) -> ChatResult<AskResponse> {
    let value: Value = serde_json::from_str(body).map_err(ChatApiError::undecodable)?;
    let sources_ok = value
        .get("source_urls")
        .and_then(Value::as_array)
        .is_some_and(|urls| urls.iter().all(Value::is_string));
    if !sources_ok {
        return Err(ChatApiError::missing_sources());
    }
    serde_json::from_value(value).map_err(ChatApiError::undecodable)
}

#[derive(Debug, thiserror::Error)]
#[error("request cancelled")]
struct Cancelled;
