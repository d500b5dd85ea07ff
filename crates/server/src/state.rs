use std::sync::Arc;

use hookrelay_core::config::{Config, Recipient};
use hookrelay_ingest::HandlerRegistry;
use hookrelay_notify::Broadcaster;

use crate::service::DispatchService;

/// One `POST` route: which webhook it feeds and who hears about it.
#[derive(Debug, Clone)]
pub struct WebhookRoute {
    pub name: String,
    pub path: String,
    pub recipients: Vec<Recipient>,
}

pub struct AppState {
    pub service: DispatchService,
    pub routes: Vec<Arc<WebhookRoute>>,
    /// Sorted, unique webhook types for the listing endpoints.
    pub webhook_types: Vec<String>,
    pub notifier_types: Vec<String>,
}

impl AppState {
    pub fn new(config: &Config, handlers: HandlerRegistry, broadcaster: Broadcaster) -> Self {
        let routes = config
            .webhooks
            .iter()
            .map(|hook| {
                Arc::new(WebhookRoute {
                    name: hook.name.clone(),
                    path: hook.path.clone(),
                    recipients: config.recipients_for(hook),
                })
            })
            .collect();

        Self {
            service: DispatchService::new(handlers, broadcaster),
            routes,
            webhook_types: config.webhook_types(),
            notifier_types: config.notifier_types(),
        }
    }
}
