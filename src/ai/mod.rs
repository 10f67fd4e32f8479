/// Question answering for the assistant
///
/// This module talks to the campus question-answering endpoint: one question in,
/// one answer with its supporting source URLs out.
///
/// # Architecture
///
/// - `client` - `QuestionClient`, the reqwest-based HTTP implementation
/// - `error` - `ChatApiError`, the uniform error shape for transport, HTTP and response failures
///
/// The chat session depends only on the `QuestionBackend` trait so it can be
/// driven by other backends.
///
/// # Usage
///
/// ```rust,no_run
/// use gunadarma_assistant::ai::{AskRequest, QuestionClient};
///
/// # async fn example() -> Result<(), gunadarma_assistant::ai::ChatApiError> {
/// let client = QuestionClient::new("http://localhost:8000/api/v1/ask");
/// let response = client.ask(&AskRequest::new("Kapan jadwal UTS?"), None).await?;
/// println!("{} ({} sources)", response.answer, response.source_urls.len());
/// # Ok(())
/// # }
/// ```
mod client;
mod error;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use client::{AskRequest, AskResponse, QuestionClient, parse_answer};
pub use error::{ChatApiError, ErrorKind, friendly_http_message};

pub type ChatResult<T> = Result<T, ChatApiError>;

#[async_trait]
pub trait QuestionBackend: Send + Sync {
    async fn ask(&self, request: AskRequest, cancel: &CancellationToken)
    -> ChatResult<AskResponse>;
}
