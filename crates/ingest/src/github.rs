//! GitHub webhooks: HMAC-signed, JSON or form-encoded, event in a header.

use std::sync::Arc;

use hookrelay_core::config::WebhookType;
use hookrelay_core::InboundRequest;
use hookrelay_notify::TemplateSet;

use crate::error::HandlerError;
use crate::handler::{HandlerOptions, Normalizer, ParsedEvent, TemplatedHandler};
use crate::payload;
use crate::verify::Verifier;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const EVENT_HEADER: &str = "X-GitHub-Event";

#[derive(Debug, Clone, Copy, Default)]
pub struct GithubNormalizer;

impl Normalizer for GithubNormalizer {
    fn webhook_type(&self) -> WebhookType {
        WebhookType::Github
    }

    fn parse(&self, req: &InboundRequest) -> Result<ParsedEvent, HandlerError> {
        let data = payload::into_object(payload::decode_json_or_form(req)?, "payload")?;

        let event_name = req
            .header(EVENT_HEADER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| HandlerError::malformed(format!("missing {EVENT_HEADER} header")))?;

        Ok(ParsedEvent {
            event_name: event_name.to_string(),
            data,
        })
    }
}

pub fn handler(
    secret: impl Into<String>,
    templates: Arc<TemplateSet>,
    options: HandlerOptions,
) -> TemplatedHandler<GithubNormalizer> {
    TemplatedHandler::new(
        Verifier::HmacSha256 {
            header: SIGNATURE_HEADER,
            secret: secret.into(),
        },
        GithubNormalizer,
        templates,
        options,
    )
}
