//! Name-keyed webhook handlers, built once from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use hookrelay_core::config::{Config, WebhookConfig, WebhookType};
use hookrelay_notify::TemplateSet;

use crate::custom::CustomHandler;
use crate::handler::{HandlerOptions, WebhookHandler};
use crate::{github, kanboard};

/// Read-only map from webhook name to its handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn WebhookHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One handler per configured webhook. `templates` is the lookup set.
    pub fn from_config(config: &Config, templates: Arc<TemplateSet>) -> Self {
        let mut registry = Self::new();
        for hook in &config.webhooks {
            let options = HandlerOptions {
                disable_unknown_templates: config.disable_unknown_templates_for(hook),
                render: hook.render,
            };
            registry.insert(hook.name.clone(), build_handler(hook, templates.clone(), options));
            tracing::debug!(
                webhook = %hook.name,
                kind = %hook.webhook_type,
                path = %hook.path,
                "webhook handler registered"
            );
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn WebhookHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn WebhookHandler>> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Pick the handler implementation for a webhook's declared type.
pub fn build_handler(
    hook: &WebhookConfig,
    templates: Arc<TemplateSet>,
    options: HandlerOptions,
) -> Arc<dyn WebhookHandler> {
    match hook.webhook_type {
        WebhookType::Github => Arc::new(github::handler(hook.secret.clone(), templates, options)),
        WebhookType::Kanboard => Arc::new(kanboard::handler(
            hook.secret.clone(),
            hook.base_url.clone(),
            templates,
            options,
        )),
        WebhookType::Custom => Arc::new(CustomHandler::new(hook.secret.clone())),
    }
}
