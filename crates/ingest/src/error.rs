use hookrelay_notify::templating::TemplateError;

/// Why a webhook handler refused or failed a request.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("request failed verification")]
    Unauthorized,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("rendering failed: {0}")]
    Render(#[from] TemplateError),
}

impl HandlerError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
