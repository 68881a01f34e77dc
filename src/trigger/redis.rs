//! Redis-backed signal store.
//!
//! # Responsibilities
//! - Open one connection at startup and verify it with PING
//! - Serve GET/DEL for the watcher over a shared multiplexed connection
//! - Bound every round trip with the configured timeout

use std::future::Future;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::time::timeout;

use crate::config::RedisConfig;
use crate::trigger::store::{SignalStore, StoreError};

/// Signal store backed by a single Redis database.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    addr: String,
    timeout_duration: Duration,
}

impl RedisStore {
    /// Connect and verify the server answers.
    ///
    /// Failure here is fatal for the agent; there is nothing to watch
    /// without a store.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let addr = config.addr();
        let timeout_duration = Duration::from_secs(config.timeout_secs);
        let connect_err = |reason: String| StoreError::Connect { addr: addr.clone(), reason };

        let url = connection_url(config).map_err(|e| connect_err(e.to_string()))?;
        let client = redis::Client::open(url.as_str()).map_err(|e| connect_err(e.to_string()))?;

        let connecting = client.get_multiplexed_async_connection();
        let mut conn = match timeout(timeout_duration, connecting).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(connect_err(e.to_string())),
            Err(_) => return Err(connect_err(format!("timed out after {}s", config.timeout_secs))),
        };

        let ping: Result<redis::RedisResult<String>, _> =
            timeout(timeout_duration, redis::cmd("PING").query_async(&mut conn)).await;
        match ping {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(connect_err(e.to_string())),
            Err(_) => return Err(connect_err("PING timed out".to_string())),
        }

        tracing::info!(addr = %addr, db = config.db, "Connected to Redis");

        Ok(Self {
            conn,
            addr,
            timeout_duration,
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.timeout_duration, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout {
                op,
                secs: self.timeout_duration.as_secs(),
            }),
        }
    }
}

impl SignalStore for RedisStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        async move {
            let mut conn = self.conn.clone();
            let value: Option<Vec<u8>> = self.bounded("GET", conn.get(key)).await?;
            Ok(value)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            let mut conn = self.conn.clone();
            let _removed: i64 = self.bounded("DEL", conn.del(key)).await?;
            Ok(())
        }
        .boxed()
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.addr)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

/// Build `redis://[:password@]host:port/db` with the password escaped.
fn connection_url(config: &RedisConfig) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(&format!("redis://{}/{}", config.addr(), config.db))?;
    if !config.password.is_empty() {
        // Only fails for cannot-be-a-base URLs, which redis:// is not.
        let _ = url.set_password(Some(&config.password));
    }
    Ok(url)
}
