use std::time::Duration;

use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{AsyncCommands, Client, ConnectionInfo};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{LookupStore, StoreError};

/// Upper bound on establishing the shared connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed store. Nothing is dialed until the first command; after that
/// every caller shares one multiplexed connection.
///
/// Dialing makes a single attempt bounded by [`CONNECT_TIMEOUT`]. A failed
/// dial leaves the store unconnected, so the next command dials again.
pub struct RedisStore {
    client: Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    pub fn new(info: ConnectionInfo) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(info)?,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!(addr = %self.client.get_connection_info().addr, "connecting to redis");
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(0)
                    .set_connection_timeout(CONNECT_TIMEOUT);
                let connect = ConnectionManager::new_with_config(self.client.clone(), config);
                match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
                    Ok(conn) => conn.map_err(StoreError::from),
                    Err(_) => Err(StoreError::Unavailable(format!(
                        "connect timed out after {}s",
                        CONNECT_TIMEOUT.as_secs()
                    ))),
                }
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl LookupStore for RedisStore {
    async fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.sismember(key, member).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.exists(key).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
