//! `ask_redis`: is a domain a member of the configured Redis set?

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, MembershipSettings};
use crate::store::{LookupStore, RedisStore, StoreError, StoreHandle};

pub struct AskRedis {
    settings: MembershipSettings,
    store: StoreHandle,
}

impl AskRedis {
    pub const ID: &'static str = "http.handlers.ask_redis";

    /// Validate settings. Nothing is connected until [`provision`](Self::provision).
    pub fn new(settings: MembershipSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            store: StoreHandle::new(),
        })
    }

    pub fn settings(&self) -> &MembershipSettings {
        &self.settings
    }

    /// Create the Redis client. Reachability is not checked here; a down
    /// server shows up as failed lookups.
    pub async fn provision(&self) -> anyhow::Result<()> {
        info!(
            module = Self::ID,
            address = %self.settings.address(),
            db = self.settings.db,
            "creating redis client"
        );
        let store = RedisStore::new(self.settings.connection_info())?;
        self.provision_with(Arc::new(store)).await;
        Ok(())
    }

    pub async fn provision_with(&self, store: Arc<dyn LookupStore>) {
        self.store.install(store).await;
    }

    /// Raw `SISMEMBER` against the configured key.
    pub async fn lookup(&self, domain: &str) -> Result<bool, StoreError> {
        let store = self.store.get().await?;
        store.is_member(&self.settings.key, domain).await
    }

    /// Membership with store errors folded into "not a member".
    pub async fn is_member(&self, domain: &str) -> bool {
        if domain.is_empty() {
            return false;
        }
        match self.lookup(domain).await {
            Ok(found) => {
                debug!(domain, key = %self.settings.key, found, "membership lookup");
                found
            }
            Err(e) => {
                warn!(domain, key = %self.settings.key, error = %e, "membership lookup failed");
                false
            }
        }
    }

    pub async fn cleanup(&self) {
        if self.store.release().await {
            info!(module = Self::ID, "redis client released");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::MemoryStore;

    struct Broken;

    #[async_trait]
    impl LookupStore for Broken {
        async fn is_member(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn exists(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn settings(key: &str) -> MembershipSettings {
        MembershipSettings {
            key: key.into(),
            ..Default::default()
        }
    }

    async fn with_members(members: &[&str]) -> AskRedis {
        let store = MemoryStore::new();
        for m in members {
            store.add_member("domains", *m).await;
        }
        let module = AskRedis::new(settings("domains")).unwrap();
        module.provision_with(Arc::new(store)).await;
        module
    }

    #[test]
    fn empty_key_is_rejected_up_front() {
        assert!(matches!(
            AskRedis::new(settings("")),
            Err(ConfigError::EmptyKey)
        ));
    }

    #[tokio::test]
    async fn members_and_non_members() {
        let module = with_members(&["example.com"]).await;
        assert!(module.is_member("example.com").await);
        assert!(!module.is_member("www.example.com").await);
        assert!(!module.is_member("other.org").await);
    }

    #[tokio::test]
    async fn empty_domain_is_never_a_member() {
        let module = with_members(&[""]).await;
        assert!(!module.is_member("").await);
    }

    #[tokio::test]
    async fn store_errors_read_as_not_member() {
        let module = AskRedis::new(settings("domains")).unwrap();
        module.provision_with(Arc::new(Broken)).await;
        assert!(module.lookup("example.com").await.is_err());
        assert!(!module.is_member("example.com").await);
    }

    #[tokio::test]
    async fn provision_does_not_require_a_reachable_server() {
        let module = AskRedis::new(MembershipSettings {
            port: 1,
            ..settings("domains")
        })
        .unwrap();
        module.provision().await.unwrap();
        module.cleanup().await;
    }

    #[tokio::test]
    async fn cleanup_is_safe_before_provision_and_twice() {
        let module = AskRedis::new(settings("domains")).unwrap();
        module.cleanup().await;
        module.cleanup().await;
        assert!(!module.is_member("example.com").await);

        let module = with_members(&["example.com"]).await;
        module.cleanup().await;
        module.cleanup().await;
        assert!(matches!(
            module.lookup("example.com").await,
            Err(StoreError::Closed)
        ));
    }
}
