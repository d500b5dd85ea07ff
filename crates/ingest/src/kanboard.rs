//! Kanboard webhooks: query-token auth, `{event_name, event_data}` envelope.
//!
//! When a `base_url` is configured, task events are enriched with a
//! browsable `task.url` built from `task.id` and `task.project_id`.

use std::sync::Arc;

use hookrelay_core::config::WebhookType;
use hookrelay_core::InboundRequest;
use hookrelay_notify::TemplateSet;
use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::handler::{HandlerOptions, Normalizer, ParsedEvent, TemplatedHandler};
use crate::payload;
use crate::verify::Verifier;

pub const TOKEN_PARAM: &str = "token";

#[derive(Debug, Clone, Default)]
pub struct KanboardNormalizer {
    base_url: Option<String>,
}

impl KanboardNormalizer {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        }
    }

    /// `<base>/?controller=TaskViewController&action=show&task_id=..&project_id=..`
    pub fn task_url(&self, task_id: &str, project_id: &str) -> Option<String> {
        let base = self.base_url.as_deref()?;
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("controller", "TaskViewController")
            .append_pair("action", "show")
            .append_pair("task_id", task_id)
            .append_pair("project_id", project_id)
            .finish();
        Some(format!("{base}/?{query}"))
    }
}

impl Normalizer for KanboardNormalizer {
    fn webhook_type(&self) -> WebhookType {
        WebhookType::Kanboard
    }

    fn parse(&self, req: &InboundRequest) -> Result<ParsedEvent, HandlerError> {
        let mut envelope = payload::into_object(payload::decode_json(req)?, "payload")?;

        let event_name = match envelope.remove("event_name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => return Err(HandlerError::malformed("event_name is missing from payload")),
        };

        let data = match envelope.remove("event_data") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(HandlerError::malformed(
                    "event_data must be a JSON object",
                ))
            }
        };

        Ok(ParsedEvent { event_name, data })
    }

    fn enrich(&self, data: &mut Map<String, Value>) {
        let Some(Value::Object(task)) = data.get_mut("task") else {
            return;
        };
        let url = match (task.get("id"), task.get("project_id")) {
            (Some(Value::String(id)), Some(Value::String(project_id))) => {
                self.task_url(id, project_id)
            }
            _ => None,
        };
        if let Some(url) = url {
            task.insert("url".to_string(), Value::String(url));
        }
    }
}

pub fn handler(
    secret: impl Into<String>,
    base_url: Option<String>,
    templates: Arc<TemplateSet>,
    options: HandlerOptions,
) -> TemplatedHandler<KanboardNormalizer> {
    TemplatedHandler::new(
        Verifier::QueryToken {
            param: TOKEN_PARAM,
            secret: secret.into(),
        },
        KanboardNormalizer::new(base_url),
        templates,
        options,
    )
}
