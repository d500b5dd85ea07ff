//! Request-level and startup errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hookrelay_core::ConfigError;
use hookrelay_ingest::HandlerError;
use hookrelay_notify::templating::TemplateError;
use hookrelay_notify::NotifyError;

/// Why a webhook request was not acknowledged.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for webhook '{0}'")]
    UnknownWebhook(String),

    #[error("request failed verification")]
    Unauthorized,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("rendering failed: {0}")]
    Render(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownWebhook(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Unauthorized => Self::Unauthorized,
            HandlerError::Malformed(reason) => Self::Malformed(reason),
            HandlerError::Render(e) => Self::Render(e.to_string()),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Render details stay in the logs.
        let body = match &self {
            Self::Malformed(reason) => format!("Bad Request: {reason}"),
            _ => status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        };
        (status, body).into_response()
    }
}

/// Fatal errors while wiring the relay together.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load templates: {0}")]
    Templates(#[from] TemplateError),

    #[error("notifier '{name}' could not be created: {source}")]
    Notifier {
        name: String,
        #[source]
        source: NotifyError,
    },
}
