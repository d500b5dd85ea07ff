//! SMTP email notifier via `lettre` with TLS support.
//!
//! Delivers notifications as plain-text emails through an SMTP server,
//! one message per target address. Supports STARTTLS and implicit TLS
//! connections and PLAIN authentication.

use std::sync::Arc;

use hookrelay_core::config::EmailSettings;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio_util::sync::CancellationToken;

use crate::templating::TemplateSet;
use crate::traits::{Notification, Notifier, NotifyError};

const DEFAULT_SUBJECT: &str = "Webhook Notification";

/// Sends notifications as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    /// Async SMTP transport for sending emails.
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Sender mailbox.
    from: Mailbox,
    subject: String,
    /// Plain (non-escaping) template set for deferred notifications.
    templates: Arc<TemplateSet>,
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from decoded SMTP settings.
    ///
    /// - `port`: defaults to 587; port 465 always uses implicit TLS.
    /// - `tls`: `None` or `Some(true)` enables STARTTLS on other ports,
    ///   `Some(false)` connects in clear text.
    /// - `username`/`password`: when both are set, PLAIN authentication is used.
    pub fn from_config(
        settings: EmailSettings,
        templates: Arc<TemplateSet>,
    ) -> Result<Self, NotifyError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        if settings.host.is_empty() {
            return Err(NotifyError::Config("SMTP host must not be empty".to_string()));
        }

        let port = settings.port.unwrap_or(587);
        let use_tls = settings.tls.unwrap_or(true);

        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host).port(port)
        };

        if let (Some(username), Some(password)) = (settings.username, settings.password) {
            builder = builder
                .credentials(Credentials::new(username, password))
                .authentication(vec![Mechanism::Plain]);
        }

        Ok(Self {
            transport: builder.build(),
            from,
            subject: settings
                .subject
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            templates,
        })
    }

    fn build_message(&self, to: Mailbox, body: String) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&self.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    /// Send one email to `target`.
    ///
    /// The SMTP exchange races against `cancel`; a cancelled delivery
    /// returns [`NotifyError::Cancelled`] without waiting for the server.
    async fn send(
        &self,
        cancel: &CancellationToken,
        target: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let to: Mailbox = target
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;
        let body = notification.render(&self.templates)?.into_owned();
        let email = self.build_message(to, body)?;

        tokio::select! {
            _ = cancel.cancelled() => return Err(NotifyError::Cancelled),
            result = self.transport.send(email) => {
                result.map_err(|e| NotifyError::Smtp(e.to_string()))?;
            }
        }

        tracing::info!(
            channel = "email",
            target,
            subject = %self.subject,
            "notification delivered"
        );

        Ok(())
    }

    /// Returns `"email"`.
    fn channel_name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::templating::{EmbeddedSource, TemplateFunctions, TemplateRegistry};

    fn templates() -> Arc<TemplateSet> {
        let mut registry = TemplateRegistry::new();
        registry
            .register_source(
                "kanboard",
                EmbeddedSource::new(&[("task.create.tmpl", "New task {{ task.title | esc }}")]),
                &["*.tmpl"],
            )
            .unwrap();
        Arc::new(registry.load_all(&TemplateFunctions::plain()).unwrap())
    }

    fn settings(host: &str, port: Option<u16>, tls: Option<bool>) -> EmailSettings {
        EmailSettings {
            host: host.to_string(),
            port,
            username: None,
            password: None,
            from: "hooks@example.com".to_string(),
            subject: None,
            tls,
        }
    }

    #[test]
    fn parse_email_with_display_name() {
        let mailbox: Result<Mailbox, _> = "Alice <alice@example.com>".parse();
        let mb = mailbox.unwrap();
        assert_eq!(mb.email.to_string(), "alice@example.com");
    }

    #[test]
    fn from_config_valid() {
        let notifier =
            EmailNotifier::from_config(settings("smtp.example.com", Some(587), Some(true)), templates());
        assert!(notifier.is_ok());
        assert_eq!(notifier.unwrap().subject, DEFAULT_SUBJECT);
    }

    #[test]
    fn from_config_with_credentials_and_subject() {
        let mut s = settings("smtp.example.com", None, None);
        s.username = Some("user".to_string());
        s.password = Some("pass".to_string());
        s.subject = Some("Hooks".to_string());
        let notifier = EmailNotifier::from_config(s, templates()).unwrap();
        assert_eq!(notifier.subject, "Hooks");
    }

    #[test]
    fn from_config_invalid_from_address() {
        let mut s = settings("smtp.example.com", None, None);
        s.from = "bad-address".to_string();
        let err = EmailNotifier::from_config(s, templates())
            .unwrap_err()
            .to_string();
        assert!(err.contains("Configuration error"), "got: {err}");
    }

    #[test]
    fn from_config_empty_host() {
        let err = EmailNotifier::from_config(settings("", None, None), templates())
            .unwrap_err()
            .to_string();
        assert!(err.contains("host"), "got: {err}");
    }

    #[test]
    fn from_config_implicit_tls_port() {
        let notifier =
            EmailNotifier::from_config(settings("smtp.example.com", Some(465), None), templates());
        assert!(notifier.is_ok());
    }

    #[test]
    fn from_config_no_tls() {
        let notifier =
            EmailNotifier::from_config(settings("smtp.example.com", Some(25), Some(false)), templates());
        assert!(notifier.is_ok());
    }

    #[test]
    fn channel_name_is_email() {
        let notifier =
            EmailNotifier::from_config(settings("smtp.example.com", None, None), templates()).unwrap();
        assert_eq!(notifier.channel_name(), "email");
    }

    #[test]
    fn message_carries_rendered_body() {
        let notifier =
            EmailNotifier::from_config(settings("smtp.example.com", None, None), templates()).unwrap();
        let notification = Notification::template(
            "kanboard/task.create.tmpl",
            serde_json::json!({"task": {"title": "Fix *bug*"}}),
        );
        let body = notification.render(&notifier.templates).unwrap().into_owned();
        assert_eq!(body, "New task Fix *bug*");

        let message = notifier
            .build_message("ops@example.com".parse().unwrap(), body)
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Webhook Notification"), "got: {raw}");
        assert!(raw.contains("To: ops@example.com"), "got: {raw}");
        assert!(raw.contains("New task Fix *bug*"), "got: {raw}");
    }

    #[tokio::test]
    async fn invalid_target_is_rejected() {
        let notifier =
            EmailNotifier::from_config(settings("smtp.example.com", None, None), templates()).unwrap();
        let err = notifier
            .send(&CancellationToken::new(), "not-an-email", &Notification::body("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn cancellation_aborts_stalled_smtp_session() {
        // Accepts connections but never sends the SMTP greeting.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier =
            EmailNotifier::from_config(settings("127.0.0.1", Some(port), Some(false)), templates())
                .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = notifier
            .send(&cancel, "ops@example.com", &Notification::body("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, NotifyError::Cancelled), "got: {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
