pub mod handle;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::handle::StoreHandle;
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("store not provisioned")]
    NotProvisioned,

    #[error("store closed")]
    Closed,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The two lookups the modules need, plus a reachability check.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait LookupStore: Send + Sync {
    /// `SISMEMBER key member`
    async fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// `EXISTS key`
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// `PING`
    async fn ping(&self) -> Result<(), StoreError>;
}
