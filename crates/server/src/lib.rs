//! HTTP front of hookrelay.
//!
//! This crate provides:
//! - `DispatchService`, which routes a request to its webhook handler and
//!   broadcasts the resulting notification
//! - The axum router (webhook routes, health, type listings)
//! - Startup wiring from a loaded `Config`

pub mod api;
pub mod error;
pub mod router;
pub mod service;
pub mod startup;
pub mod state;

pub use error::{DispatchError, StartupError};
pub use router::build_router;
pub use service::DispatchService;
pub use startup::build_app_state;
pub use state::AppState;
