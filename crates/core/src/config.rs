use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Paths served by the router itself; webhooks may not claim them.
pub const RESERVED_PATHS: &[&str] = &["/", "/health", "/webhooks", "/adapters", "/notifiers"];

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen address for the HTTP server.
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Global default for webhooks that don't set their own.
    #[serde(default)]
    pub disable_unknown_templates: bool,
    /// Optional on-disk replacement for the compiled-in provider templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

impl Config {
    /// Read, env-resolve and validate a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse a YAML document, resolve `${VAR}` references and validate.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.resolve_env()?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_env(&mut self) -> Result<(), ConfigError> {
        for hook in &mut self.webhooks {
            hook.secret = resolve_env_vars(&hook.secret)?;
            if let Some(base_url) = hook.base_url.as_mut() {
                *base_url = resolve_env_vars(base_url)?;
            }
        }
        for notifier in &mut self.notifiers {
            for (_, value) in notifier.settings.iter_mut() {
                resolve_yaml_value(value)?;
            }
        }
        Ok(())
    }

    /// Check the invariants the router and wiring rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for hook in &self.webhooks {
            if hook.name.is_empty() {
                return Err(ConfigError::Invalid("webhook name must not be empty".into()));
            }
            if !names.insert(hook.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate webhook name '{}'",
                    hook.name
                )));
            }
            if !hook.path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}': path '{}' must start with '/'",
                    hook.name, hook.path
                )));
            }
            if hook.path.contains(['{', '}', '*']) {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}': path '{}' must not contain route captures",
                    hook.name, hook.path
                )));
            }
            if RESERVED_PATHS.contains(&hook.path.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}': path '{}' is reserved",
                    hook.name, hook.path
                )));
            }
            if !paths.insert(hook.path.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate webhook path '{}'",
                    hook.path
                )));
            }
            if hook.secret.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}': secret must not be empty",
                    hook.name
                )));
            }
        }

        let mut notifier_names = HashSet::new();
        for notifier in &self.notifiers {
            if notifier.name.is_empty() {
                return Err(ConfigError::Invalid("notifier name must not be empty".into()));
            }
            if !notifier_names.insert(notifier.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate notifier name '{}'",
                    notifier.name
                )));
            }
        }

        let mut recipient_names = HashSet::new();
        for recipient in &self.recipients {
            if recipient.name.is_empty() || recipient.target.is_empty() {
                return Err(ConfigError::Invalid(
                    "recipient name and target must not be empty".into(),
                ));
            }
            if !recipient_names.insert(recipient.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate recipient name '{}'",
                    recipient.name
                )));
            }
        }

        Ok(())
    }

    /// Effective "drop unknown events" flag for one webhook.
    pub fn disable_unknown_templates_for(&self, hook: &WebhookConfig) -> bool {
        hook.disable_unknown_templates
            .unwrap_or(self.disable_unknown_templates)
    }

    /// Resolve a webhook's recipient names, skipping (and logging) unknown ones.
    pub fn recipients_for(&self, hook: &WebhookConfig) -> Vec<Recipient> {
        let by_name: HashMap<&str, &Recipient> = self
            .recipients
            .iter()
            .map(|r| (r.name.as_str(), r))
            .collect();

        hook.recipients
            .iter()
            .filter_map(|name| match by_name.get(name.as_str()) {
                Some(r) => Some((*r).clone()),
                None => {
                    tracing::warn!(
                        webhook = %hook.name,
                        recipient = %name,
                        "webhook references unknown recipient, skipping"
                    );
                    None
                }
            })
            .collect()
    }

    /// Recipients bound to a notifier that isn't configured.
    pub fn orphaned_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients
            .iter()
            .filter(|r| !self.notifiers.iter().any(|n| n.name == r.notifier))
    }

    /// Sorted, de-duplicated webhook types.
    pub fn webhook_types(&self) -> Vec<String> {
        self.webhooks
            .iter()
            .map(|h| h.webhook_type.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted, de-duplicated notifier types.
    pub fn notifier_types(&self) -> Vec<String> {
        self.notifiers
            .iter()
            .map(|n| n.notifier_type.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  addr:       {}", self.addr);
        tracing::info!("  webhooks:   {}", self.webhooks.len());
        tracing::info!("  notifiers:  {}", self.notifiers.len());
        tracing::info!("  recipients: {}", self.recipients.len());
        if let Some(dir) = &self.templates_dir {
            tracing::info!("  templates:  {}", dir.display());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// ── Webhooks ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookType {
    Github,
    Kanboard,
    Custom,
}

impl WebhookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Kanboard => "kanboard",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for WebhookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a templated webhook turns its payload into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Hand a template reference to each notifier (channel-specific escaping).
    #[default]
    Deferred,
    /// Render once in the handler with plain functions.
    Immediate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub webhook_type: WebhookType,
    pub secret: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub disable_unknown_templates: Option<bool>,
    #[serde(default)]
    pub render: RenderMode,
}

// ── Notifiers ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierType {
    Telegram,
    Email,
}

impl NotifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for NotifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub notifier_type: NotifierType,
    #[serde(default)]
    pub settings: serde_yaml::Mapping,
}

impl NotifierConfig {
    /// Decode the free-form `settings` block into a typed settings struct.
    pub fn decode_settings<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_yaml::from_value(serde_yaml::Value::Mapping(self.settings.clone())).map_err(|e| {
            ConfigError::Settings {
                name: self.name.clone(),
                reason: e.to_string(),
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    pub token: String,
    /// Bot API base URL, `https://api.telegram.org` when unset.
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub tls: Option<bool>,
}

// ── Recipients ────────────────────────────────────────────────

/// A delivery target bound to one configured notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub target: String,
    pub notifier: String,
}

// ── Env resolution ────────────────────────────────────────────

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
pub fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(ConfigError::UnclosedEnvRef(input.to_string()));
            }
            let value =
                std::env::var(&var_name).map_err(|_| ConfigError::MissingEnv(var_name.clone()))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_yaml_value(value: &mut serde_yaml::Value) -> Result<(), ConfigError> {
    match value {
        serde_yaml::Value::String(s) => *s = resolve_env_vars(s)?,
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                resolve_yaml_value(item)?;
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                resolve_yaml_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}
