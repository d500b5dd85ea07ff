//! Webhook handler contract and the shared template-selection policy.
//!
//! A handler is verification plus normalization for one configured
//! webhook. Providers that render through templates implement
//! [`Normalizer`] and get wrapped in a [`TemplatedHandler`], which owns the
//! selection policy:
//!
//! 1. `<namespace>/<event>.tmpl` if registered;
//! 2. otherwise nothing at all when unknown events are disabled;
//! 3. otherwise `<namespace>/default.tmpl`, which must exist.

use std::sync::Arc;

use hookrelay_core::config::{RenderMode, WebhookType};
use hookrelay_core::InboundRequest;
use hookrelay_notify::{Notification, TemplateSet};
use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::verify::Verifier;

/// Key under which the resolved event name is injected into template data.
pub const EVENT_NAME_KEY: &str = "event_name";

pub const TEMPLATE_EXTENSION: &str = ".tmpl";
pub const DEFAULT_TEMPLATE: &str = "default";

/// The per-webhook unit the dispatch service routes to.
pub trait WebhookHandler: Send + Sync {
    fn webhook_type(&self) -> WebhookType;

    /// Authenticity check; must not look at anything but the request.
    fn verify(&self, req: &InboundRequest) -> bool;

    /// Turn a verified request into a notification.
    ///
    /// `Ok(None)` means the event was recognised as droppable: the request
    /// succeeds but nothing is broadcast.
    fn process(&self, req: &InboundRequest) -> Result<Option<Notification>, HandlerError>;

    /// Verify, then process. Unverified requests never reach parsing.
    fn handle(&self, req: &InboundRequest) -> Result<Option<Notification>, HandlerError> {
        if !self.verify(req) {
            return Err(HandlerError::Unauthorized);
        }
        self.process(req)
    }
}

/// Event name and template data extracted from a provider payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub event_name: String,
    pub data: Map<String, Value>,
}

/// Provider-specific payload decoding for templated webhooks.
pub trait Normalizer: Send + Sync {
    fn webhook_type(&self) -> WebhookType;

    /// Template namespace; the provider type name unless overridden.
    fn namespace(&self) -> &'static str {
        self.webhook_type().as_str()
    }

    fn parse(&self, req: &InboundRequest) -> Result<ParsedEvent, HandlerError>;

    /// Optional post-parse enrichment. Must silently no-op when the fields
    /// it needs are missing or of the wrong type.
    fn enrich(&self, _data: &mut Map<String, Value>) {}
}

/// Per-webhook knobs for [`TemplatedHandler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerOptions {
    pub disable_unknown_templates: bool,
    pub render: RenderMode,
}

/// Verification + normalization + template selection.
pub struct TemplatedHandler<N> {
    verifier: Verifier,
    normalizer: N,
    /// Lookup set; also renders `immediate` webhooks, so it carries plain functions.
    templates: Arc<TemplateSet>,
    options: HandlerOptions,
}

impl<N: Normalizer> TemplatedHandler<N> {
    pub fn new(
        verifier: Verifier,
        normalizer: N,
        templates: Arc<TemplateSet>,
        options: HandlerOptions,
    ) -> Self {
        Self {
            verifier,
            normalizer,
            templates,
            options,
        }
    }
}

impl<N: Normalizer> WebhookHandler for TemplatedHandler<N> {
    fn webhook_type(&self) -> WebhookType {
        self.normalizer.webhook_type()
    }

    fn verify(&self, req: &InboundRequest) -> bool {
        self.verifier.verify(req)
    }

    fn process(&self, req: &InboundRequest) -> Result<Option<Notification>, HandlerError> {
        let ParsedEvent {
            event_name,
            mut data,
        } = self.normalizer.parse(req)?;

        // Enrichment completes before the data is frozen into the notification.
        self.normalizer.enrich(&mut data);
        data.insert(EVENT_NAME_KEY.to_string(), Value::String(event_name.clone()));

        let namespace = self.normalizer.namespace();
        let Some(template) = select_template(
            &self.templates,
            namespace,
            &event_name,
            self.options.disable_unknown_templates,
        )?
        else {
            tracing::debug!(
                namespace,
                event = %event_name,
                "no template for event, dropping"
            );
            return Ok(None);
        };

        tracing::debug!(event = %event_name, %template, "event normalized");

        let data = Value::Object(data);
        match self.options.render {
            RenderMode::Deferred => Ok(Some(Notification::template(template, data))),
            RenderMode::Immediate => {
                let body = self.templates.render(&template, &data)?;
                Ok(Some(Notification::body(body)))
            }
        }
    }
}

/// Apply the selection policy for `event_name` inside `namespace`.
///
/// Returns `Ok(None)` when the event has no template and unknown events
/// are dropped, and a render error when the namespace has no default.
pub fn select_template(
    templates: &TemplateSet,
    namespace: &str,
    event_name: &str,
    disable_unknown_templates: bool,
) -> Result<Option<String>, HandlerError> {
    let specific = template_path(namespace, event_name);
    if templates.contains(&specific) {
        return Ok(Some(specific));
    }
    if disable_unknown_templates {
        return Ok(None);
    }
    let fallback = template_path(namespace, DEFAULT_TEMPLATE);
    if templates.contains(&fallback) {
        Ok(Some(fallback))
    } else {
        Err(HandlerError::Render(
            hookrelay_notify::templating::TemplateError::NotFound(fallback),
        ))
    }
}

/// `namespace/name.tmpl`
pub fn template_path(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}{TEMPLATE_EXTENSION}")
}
