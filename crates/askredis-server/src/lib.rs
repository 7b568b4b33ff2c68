use std::sync::Arc;

pub mod config;
pub mod handlers;
pub mod membership;
pub mod permission;
pub mod server;
pub mod store;

/// Provisioned modules threaded through axum handlers. A `None` module has
/// no routes mounted.
#[derive(Clone, Default)]
pub struct AppState {
    pub ask_redis: Option<Arc<membership::AskRedis>>,
    pub permission: Option<Arc<permission::PermissionByRedis>>,
}

pub use config::{Config, ConfigError};
pub use membership::AskRedis;
pub use permission::{PermissionByRedis, PermissionError};
pub use server::{provision, router, run, ServerConfig};
