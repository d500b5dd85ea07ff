pub mod config;
pub mod error;
pub mod request;

pub use config::Config;
pub use error::*;
pub use request::InboundRequest;
