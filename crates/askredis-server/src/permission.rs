//! On-demand TLS permission: may a certificate be issued for this hostname?
//!
//! The hostname is normalized by dropping one leading `www.`, then prefixed
//! with the configured `prefix` to form the Redis key. Issuance is allowed
//! only when that key exists.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, PermissionSettings};
use crate::store::{LookupStore, RedisStore, StoreError, StoreHandle};

/// A refused certificate. Every value of this type is a permission denial,
/// and its message reads `<name>: permission denied (...)`. The variants
/// differ only in whether the lookup itself failed.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("{name}: permission denied (redis key {key} not found)")]
    NotFound { name: String, key: String },

    #[error("{name}: permission denied (error looking up {key} - {source})")]
    Lookup {
        name: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl PermissionError {
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound { name, .. } | Self::Lookup { name, .. } => name,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key, .. } | Self::Lookup { key, .. } => key,
        }
    }
}

/// Strip a single leading `www.`.
pub fn normalize_name(name: &str) -> &str {
    name.strip_prefix("www.").unwrap_or(name)
}

pub struct PermissionByRedis {
    settings: PermissionSettings,
    store: StoreHandle,
}

impl PermissionByRedis {
    pub const ID: &'static str = "tls.permission.redis";

    pub fn new(settings: PermissionSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            store: StoreHandle::new(),
        })
    }

    pub fn settings(&self) -> &PermissionSettings {
        &self.settings
    }

    /// Connect and ping. An unreachable server fails provisioning.
    pub async fn provision(&self) -> anyhow::Result<()> {
        info!(
            module = Self::ID,
            address = %self.settings.address,
            db = self.settings.db,
            "creating redis client"
        );
        let store = RedisStore::new(self.settings.connection_info()?)?;
        self.provision_with(Arc::new(store)).await?;
        Ok(())
    }

    /// Install `store` after confirming it answers a ping.
    pub async fn provision_with(&self, store: Arc<dyn LookupStore>) -> Result<(), StoreError> {
        store.ping().await?;
        self.store.install(store).await;
        Ok(())
    }

    pub fn storage_key(&self, name: &str) -> String {
        format!("{}{}", self.settings.prefix, normalize_name(name))
    }

    pub async fn certificate_allowed(&self, name: &str) -> Result<(), PermissionError> {
        let key = self.storage_key(name);
        let lookup = match self.store.get().await {
            Ok(store) => store.exists(&key).await,
            Err(e) => Err(e),
        };

        match lookup {
            Ok(true) => {
                debug!(name, key = %key, "allowing certificate");
                Ok(())
            }
            Ok(false) => {
                debug!(name, key = %key, "denying certificate, key not found");
                Err(PermissionError::NotFound {
                    name: name.to_owned(),
                    key,
                })
            }
            Err(source) => Err(PermissionError::Lookup {
                name: name.to_owned(),
                key,
                source,
            }),
        }
    }

    pub async fn cleanup(&self) {
        if self.store.release().await {
            info!(module = Self::ID, "redis client released");
        }
    }
}
