pub mod config;
pub mod error;
pub mod health;
pub mod types;

pub use config::Config;
pub use error::ChimeraError;
pub use health::{health_router, serve_health};
pub use types::*;
