//! Custom webhooks: header token, body forwarded verbatim.

use hookrelay_core::config::WebhookType;
use hookrelay_core::InboundRequest;
use hookrelay_notify::Notification;

use crate::error::HandlerError;
use crate::handler::WebhookHandler;
use crate::verify::Verifier;

pub const TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug)]
pub struct CustomHandler {
    verifier: Verifier,
}

impl CustomHandler {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            verifier: Verifier::HeaderToken {
                header: TOKEN_HEADER,
                secret: secret.into(),
            },
        }
    }
}

impl WebhookHandler for CustomHandler {
    fn webhook_type(&self) -> WebhookType {
        WebhookType::Custom
    }

    fn verify(&self, req: &InboundRequest) -> bool {
        self.verifier.verify(req)
    }

    fn process(&self, req: &InboundRequest) -> Result<Option<Notification>, HandlerError> {
        if req.body().is_empty() {
            return Err(HandlerError::malformed("request payload is empty"));
        }
        let text = std::str::from_utf8(req.body())
            .map_err(|e| HandlerError::malformed(format!("payload is not UTF-8: {e}")))?;
        Ok(Some(Notification::body(text)))
    }
}
