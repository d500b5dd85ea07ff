//! Outbound side of hookrelay.
//!
//! This crate provides:
//! - `Notification`, the provider-agnostic unit handed to channels
//! - `Notifier` trait for pluggable outbound channels
//! - Telegram and email notifier implementations
//! - The namespaced minijinja template registry
//! - `Broadcaster`, which fans one notification out to many recipients

pub mod broadcast;
pub mod email;
pub mod telegram;
pub mod templating;
pub mod traits;

pub use broadcast::{Broadcaster, DeliveryResult};
pub use templating::{TemplateFunctions, TemplateRegistry, TemplateSet};
pub use traits::{Notification, Notifier, NotifyError};
