use serde_json::Value;
use std::sync::Arc;

pub(crate) const TRANSPORT_MESSAGE: &str =
    "Unable to reach the assistant service. Check your connection and retry.";
pub(crate) const MISSING_SOURCES_MESSAGE: &str =
    "Assistant response was missing supporting sources.";
pub(crate) const UNDECODABLE_MESSAGE: &str = "Assistant response could not be decoded.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or an aborted request. Status is always 0.
    Transport,
    /// Non-2xx status from the endpoint.
    Http,
    /// 2xx status with a body that does not carry the required fields.
    ResponseShape,
}

/// Uniform error surfaced by the question client.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct ChatApiError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    pub code: Option<String>,
    /// Decoded JSON error body, when the endpoint sent one.
    pub body: Option<Value>,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ChatApiError {
    pub fn transport(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            kind: ErrorKind::Transport,
            status: 0,
            message: TRANSPORT_MESSAGE.to_string(),
            code: None,
            body: None,
            cause: Some(Arc::new(cause)),
        }
    }

    /// Build the error for a non-success status from the raw response body.
    pub fn from_http(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let message = field("message")
            .or_else(|| field("detail"))
            .unwrap_or_else(|| friendly_http_message(status).to_string());

        Self {
            kind: ErrorKind::Http,
            status,
            message,
            code: field("code"),
            body: parsed,
            cause: None,
        }
    }

    pub fn missing_sources() -> Self {
        Self::response_shape(MISSING_SOURCES_MESSAGE, None)
    }

    pub fn undecodable(cause: serde_json::Error) -> Self {
        Self::response_shape(UNDECODABLE_MESSAGE, Some(Arc::new(cause)))
    }

    fn response_shape(
        message: &str,
        cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind: ErrorKind::ResponseShape,
            status: 200,
            message: message.to_string(),
            code: None,
            body: None,
            cause,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

/// Status-class message shown when the endpoint gives no message of its own.
pub fn friendly_http_message(status: u16) -> &'static str {
    match status {
        s if s >= 500 => "The assistant service is unavailable. Please try again in a moment.",
        429 => "Too many requests right now. Give it a second and try again.",
        404 => "The assistant endpoint could not be reached.",
        400 => "The assistant could not understand that request.",
        _ => "We could not complete that request. Please retry.",
    }
}
