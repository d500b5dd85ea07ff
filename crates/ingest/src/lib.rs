//! Inbound side of hookrelay.
//!
//! This crate provides:
//! - Verification of provider requests (HMAC signature, header token, query token)
//! - Payload normalization for GitHub, Kanboard and custom webhooks
//! - The shared template-selection policy and embedded provider templates
//! - `HandlerRegistry`, the name-keyed set of configured handlers

pub mod custom;
pub mod error;
pub mod github;
pub mod handler;
pub mod kanboard;
pub mod payload;
pub mod registry;
pub mod templates;
pub mod verify;

pub use error::HandlerError;
pub use handler::{HandlerOptions, Normalizer, ParsedEvent, TemplatedHandler, WebhookHandler};
pub use registry::HandlerRegistry;
pub use templates::provider_templates;
