//! Notifier trait definition and shared error types.

use std::borrow::Cow;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::templating::{TemplateError, TemplateSet};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(#[from] TemplateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The channel could not parse the message's formatting markup.
    #[error("Markup rejected: {0}")]
    MarkupRejected(String),

    #[error("API error (status {status}): {description}")]
    Api { status: u16, description: String },

    #[error("Delivery cancelled")]
    Cancelled,
}

/// The provider-agnostic output of a webhook handler.
///
/// Exactly one representation exists per value: either a fully rendered
/// body, or a template reference whose data every notifier renders itself
/// with its own escaping rules. Template data sits behind an `Arc` so that
/// concurrent deliveries share one read-only copy.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Body(String),
    Template {
        name: String,
        data: Arc<serde_json::Value>,
    },
}

impl Notification {
    pub fn body(text: impl Into<String>) -> Self {
        Self::Body(text.into())
    }

    pub fn template(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::Template {
            name: name.into(),
            data: Arc::new(data),
        }
    }

    /// Template name for deferred notifications.
    pub fn template_name(&self) -> Option<&str> {
        match self {
            Self::Body(_) => None,
            Self::Template { name, .. } => Some(name),
        }
    }

    /// Render-if-needed: bodies pass through, templates render against `templates`.
    pub fn render<'a>(&'a self, templates: &TemplateSet) -> Result<Cow<'a, str>, TemplateError> {
        match self {
            Self::Body(text) => Ok(Cow::Borrowed(text)),
            Self::Template { name, data } => templates.render(name, data.as_ref()).map(Cow::Owned),
        }
    }
}

/// Trait for outbound channel implementations.
///
/// `cancel` is the delivery's own token: implementations must return
/// promptly with [`NotifyError::Cancelled`] once it fires.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to a single target (chat id, email address).
    async fn send(
        &self,
        cancel: &CancellationToken,
        target: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "telegram", "email").
    fn channel_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templating::{EmbeddedSource, TemplateFunctions, TemplateRegistry};

    fn sample_set() -> TemplateSet {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source(
                "demo",
                EmbeddedSource::new(&[("hello.tmpl", "Hello {{ who | esc }}")]),
                &["*.tmpl"],
            )
            .unwrap();
        registry.load_all(&TemplateFunctions::plain()).unwrap()
    }

    #[test]
    fn body_renders_as_is() {
        let set = sample_set();
        let notification = Notification::body("already rendered");
        assert_eq!(notification.render(&set).unwrap(), "already rendered");
        assert_eq!(notification.template_name(), None);
    }

    #[test]
    fn template_renders_with_data() {
        let set = sample_set();
        let notification =
            Notification::template("demo/hello.tmpl", serde_json::json!({"who": "world"}));
        assert_eq!(notification.template_name(), Some("demo/hello.tmpl"));
        assert_eq!(notification.render(&set).unwrap(), "Hello world");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let set = sample_set();
        let notification = Notification::template("demo/missing.tmpl", serde_json::json!({}));
        assert!(notification.render(&set).is_err());
    }

    #[test]
    fn clones_share_template_data() {
        let notification = Notification::template("demo/hello.tmpl", serde_json::json!({"a": 1}));
        let copy = notification.clone();
        match (&notification, &copy) {
            (Notification::Template { data: a, .. }, Notification::Template { data: b, .. }) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => unreachable!(),
        }
    }
}
