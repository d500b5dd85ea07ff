//! Dispatch service: webhook name → handler → broadcast.

use std::sync::Arc;

use hookrelay_core::config::Recipient;
use hookrelay_core::InboundRequest;
use hookrelay_ingest::HandlerRegistry;
use hookrelay_notify::Broadcaster;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// Routes verified requests to their handler and broadcasts the result.
///
/// Built once at startup; shared read-only by every request task.
pub struct DispatchService {
    handlers: HandlerRegistry,
    broadcaster: Broadcaster,
}

impl DispatchService {
    pub fn new(handlers: HandlerRegistry, broadcaster: Broadcaster) -> Self {
        Self {
            handlers,
            broadcaster,
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Verify, normalize and deliver one inbound webhook.
    ///
    /// Returns once every delivery attempt has finished. Delivery failures
    /// are logged only; the caller learns about verification and parsing.
    pub async fn process_webhook(
        &self,
        cancel: &CancellationToken,
        webhook: &str,
        req: &InboundRequest,
        recipients: &[Recipient],
    ) -> Result<(), DispatchError> {
        let handler = self
            .handlers
            .get(webhook)
            .ok_or_else(|| DispatchError::UnknownWebhook(webhook.to_string()))?;

        let notification = match handler.handle(req) {
            Ok(Some(notification)) => notification,
            Ok(None) => {
                tracing::info!(webhook, "event has no template, nothing to send");
                return Ok(());
            }
            Err(e) => {
                let err = DispatchError::from(e);
                tracing::warn!(webhook, kind = %handler.webhook_type(), error = %err, "webhook rejected");
                return Err(err);
            }
        };

        tracing::debug!(
            webhook,
            template = notification.template_name().unwrap_or("-"),
            recipients = recipients.len(),
            "broadcasting notification"
        );

        let results = self
            .broadcaster
            .broadcast(cancel, recipients, Arc::new(notification))
            .await;

        let delivered = results.iter().filter(|r| r.success).count();
        let failed = results.len() - delivered;
        tracing::info!(webhook, delivered, failed, "webhook processed");

        Ok(())
    }
}
