//! Server startup: templates, notifiers and handlers wired into `AppState`.
//!
//! Everything here runs once, before the listener accepts traffic. The
//! resulting state is immutable and shared by all request tasks.

use std::sync::Arc;

use hookrelay_core::config::{
    Config, EmailSettings, NotifierConfig, NotifierType, TelegramSettings,
};
use hookrelay_ingest::{provider_templates, HandlerRegistry};
use hookrelay_notify::email::EmailNotifier;
use hookrelay_notify::telegram::{telegram_functions, TelegramNotifier};
use hookrelay_notify::{
    Broadcaster, Notifier, NotifyError, TemplateFunctions, TemplateRegistry, TemplateSet,
};
use tracing::{info, warn};

use crate::error::StartupError;
use crate::state::AppState;

/// Template sets per rendering destination, loaded on first use.
struct TemplateSets<'a> {
    registry: &'a TemplateRegistry,
    telegram: Option<Arc<TemplateSet>>,
    email: Option<Arc<TemplateSet>>,
}

impl<'a> TemplateSets<'a> {
    fn new(registry: &'a TemplateRegistry) -> Self {
        Self {
            registry,
            telegram: None,
            email: None,
        }
    }

    fn telegram(&mut self) -> Result<Arc<TemplateSet>, StartupError> {
        if let Some(set) = &self.telegram {
            return Ok(set.clone());
        }
        let set = Arc::new(self.registry.load_all(&telegram_functions())?);
        self.telegram = Some(set.clone());
        Ok(set)
    }

    fn email(&mut self) -> Result<Arc<TemplateSet>, StartupError> {
        if let Some(set) = &self.email {
            return Ok(set.clone());
        }
        let set = Arc::new(self.registry.load_all(&TemplateFunctions::plain())?);
        self.email = Some(set.clone());
        Ok(set)
    }
}

/// Build `AppState` from a validated config.
pub fn build_app_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let registry = provider_templates(config.templates_dir.as_deref())?;
    let lookup = Arc::new(registry.load_all(&TemplateFunctions::plain())?);
    info!(templates = lookup.names().count(), "templates loaded");

    let mut sets = TemplateSets::new(&registry);
    let mut broadcaster = Broadcaster::empty();
    for notifier_config in &config.notifiers {
        let notifier = build_notifier(notifier_config, &mut sets)?;
        info!(
            notifier = %notifier_config.name,
            channel = notifier.channel_name(),
            "notifier ready"
        );
        broadcaster.insert(notifier_config.name.clone(), notifier);
    }

    for recipient in config.orphaned_recipients() {
        warn!(
            recipient = %recipient.name,
            notifier = %recipient.notifier,
            "recipient references unknown notifier, deliveries will be skipped"
        );
    }

    let handlers = HandlerRegistry::from_config(config, lookup);
    info!(webhooks = handlers.len(), notifiers = broadcaster.len(), "relay wired");

    Ok(Arc::new(AppState::new(config, handlers, broadcaster)))
}

fn build_notifier(
    config: &NotifierConfig,
    sets: &mut TemplateSets<'_>,
) -> Result<Arc<dyn Notifier>, StartupError> {
    let notifier_error = |source: NotifyError| StartupError::Notifier {
        name: config.name.clone(),
        source,
    };

    let notifier: Arc<dyn Notifier> = match config.notifier_type {
        NotifierType::Telegram => {
            let settings: TelegramSettings = config.decode_settings()?;
            let templates = sets.telegram()?;
            Arc::new(TelegramNotifier::from_config(settings, templates).map_err(notifier_error)?)
        }
        NotifierType::Email => {
            let settings: EmailSettings = config.decode_settings()?;
            let templates = sets.email()?;
            Arc::new(EmailNotifier::from_config(settings, templates).map_err(notifier_error)?)
        }
    };
    Ok(notifier)
}
