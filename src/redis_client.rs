use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use crate::archive::{ArchiveError, ArchiveStore};

/// Redis-backed sample archive.
///
/// The connection is opened on first use rather than at startup, so the
/// service comes up (and keeps serving analytics) while Redis is down.
/// Once established, `ConnectionManager` reconnects on its own and every
/// clone shares the same multiplexed TCP connection.
pub struct RedisArchive {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisArchive {
    /// Accepts either `host:port` or a full `redis://` URL.
    pub fn open(addr: &str) -> Result<Self, ArchiveError> {
        let client = redis::Client::open(redis_url(addr).as_str())?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, ArchiveError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl ArchiveStore for RedisArchive {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ArchiveError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), ArchiveError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn redis_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_owned()
    } else {
        format!("redis://{addr}/")
    }
}
