//! High-level Redis client
//!
//! This module provides the main `Client` interface for interacting with Redis.
//! Command families are implemented as further `impl Client` blocks under
//! [`crate::commands`], [`crate::streams`] and [`crate::script`].

use crate::connection::{Driver, RedisConnection};
use crate::core::{
    config::{ConnectionConfig, TopologyMode},
    error::{RedisError, RedisResult},
};
use redis::{Cmd, FromRedisValue};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// High-level Redis client
///
/// Cloning is cheap: clones share the underlying multiplexed connection,
/// which is safe to use from many tasks at once.
#[derive(Clone)]
pub struct Client {
    config: Arc<ConnectionConfig>,
    driver: Driver,
    connection: RedisConnection,
    operation_timeout: Option<Duration>,
}

impl Client {
    /// Connect to Redis with the given configuration
    ///
    /// The connection is verified with `PING` before returning.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rose_redis::{Client, ConnectionConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = ConnectionConfig::new("redis://localhost:6379");
    ///     let client = Client::connect(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: ConnectionConfig) -> RedisResult<Self> {
        info!("Connecting to Redis ({:?})...", config.topology_mode);

        let driver = Driver::open(&config)?;
        let connection = timeout(config.connect_timeout, driver.shared())
            .await
            .map_err(|_| RedisError::Timeout)??;

        let client = Self {
            operation_timeout: config.operation_timeout,
            config: Arc::new(config),
            driver,
            connection,
        };
        client.ping().await?;

        info!("Connected to Redis");
        Ok(client)
    }

    /// Open a client on a fresh connection reserved for blocking commands
    ///
    /// The returned client has no operation timeout; blocking reads decide
    /// their own wait time.
    pub async fn dedicated(&self) -> RedisResult<Self> {
        debug!("Opening dedicated connection");
        let connection = timeout(self.config.connect_timeout, self.driver.dedicated())
            .await
            .map_err(|_| RedisError::Timeout)??;

        Ok(Self {
            config: Arc::clone(&self.config),
            driver: self.driver.clone(),
            connection,
            operation_timeout: None,
        })
    }

    /// The configuration this client was created with
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Topology of the connected deployment
    #[must_use]
    pub fn topology_mode(&self) -> TopologyMode {
        self.config.topology_mode
    }

    /// Check the server is reachable
    pub async fn ping(&self) -> RedisResult<()> {
        let reply: String = self.execute(&redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(RedisError::UnexpectedResponse(format!(
                "PING answered {reply:?}"
            )))
        }
    }

    /// Run an arbitrary command and decode its reply
    ///
    /// The operation timeout applies. Dropping the returned future abandons
    /// the request.
    pub async fn execute<T: FromRedisValue>(&self, cmd: &Cmd) -> RedisResult<T> {
        let mut conn = self.connection.clone();
        self.bounded(conn.query(cmd)).await
    }

    /// Run a command that may block server-side, without the operation timeout
    pub(crate) async fn execute_blocking<T: FromRedisValue>(&self, cmd: &Cmd) -> RedisResult<T> {
        let mut conn = self.connection.clone();
        conn.query(cmd).await.map_err(RedisError::from)
    }

    /// Run a pipeline and decode its replies
    pub(crate) async fn execute_pipeline<T: FromRedisValue>(
        &self,
        pipe: &redis::Pipeline,
    ) -> RedisResult<T> {
        let mut conn = self.connection.clone();
        self.bounded(conn.query_pipeline(pipe)).await
    }

    async fn bounded<T, F>(&self, fut: F) -> RedisResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match self.operation_timeout {
            Some(limit) => timeout(limit, fut)
                .await
                .map_err(|_| RedisError::Timeout)?
                .map_err(RedisError::from),
            None => fut.await.map_err(RedisError::from),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("connection_string", &self.config.connection_string)
            .field("topology_mode", &self.config.topology_mode)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}
