//! Connection management on top of the `redis` driver
//!
//! Two kinds of connections are handed out:
//!
//! - the **shared** connection, multiplexed and auto-reconnecting, used for
//!   every ordinary request/response command;
//! - **dedicated** connections, opened on demand for commands that block
//!   server-side (`XREADGROUP ... BLOCK`, `BLPOP`, `BRPOP`). A blocking command
//!   on a multiplexed connection would stall every request queued behind it.

use crate::core::{
    config::{ConnectionConfig, TopologyMode},
    error::{RedisError, RedisResult},
};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, FromRedisValue, IntoConnectionInfo, Pipeline};
use tracing::debug;

/// Driver handle able to open connections for the configured topology
#[derive(Clone)]
pub(crate) enum Driver {
    Standalone(redis::Client),
    Cluster(ClusterClient),
}

impl Driver {
    /// Build a driver from configuration without touching the network
    pub(crate) fn open(config: &ConnectionConfig) -> RedisResult<Self> {
        config.validate()?;
        let urls = config.endpoint_urls();

        match config.topology_mode {
            TopologyMode::Standalone => {
                let url = urls
                    .first()
                    .ok_or_else(|| RedisError::Config("No endpoints specified".to_string()))?;
                let mut info = url.as_str().into_connection_info()?;
                info.redis.db = config.database;
                if config.password.is_some() {
                    info.redis.password = config.password.clone();
                }
                debug!("Opening standalone driver for {}", url);
                Ok(Self::Standalone(redis::Client::open(info)?))
            }
            TopologyMode::Cluster => {
                debug!("Opening cluster driver with {} seed nodes", urls.len());
                let mut builder = ClusterClientBuilder::new(urls);
                if let Some(ref password) = config.password {
                    builder = builder.password(password.clone());
                }
                Ok(Self::Cluster(builder.build()?))
            }
        }
    }

    /// Open the shared, multiplexed connection
    pub(crate) async fn shared(&self) -> RedisResult<RedisConnection> {
        match self {
            Self::Standalone(client) => ConnectionManager::new(client.clone())
                .await
                .map(RedisConnection::Managed)
                .map_err(connection_error),
            Self::Cluster(client) => client
                .get_async_connection()
                .await
                .map(RedisConnection::Cluster)
                .map_err(connection_error),
        }
    }

    /// Open a fresh connection reserved for blocking commands
    pub(crate) async fn dedicated(&self) -> RedisResult<RedisConnection> {
        match self {
            Self::Standalone(client) => client
                .get_multiplexed_async_connection()
                .await
                .map(RedisConnection::Dedicated)
                .map_err(connection_error),
            Self::Cluster(client) => client
                .get_async_connection()
                .await
                .map(RedisConnection::Cluster)
                .map_err(connection_error),
        }
    }
}

fn connection_error(err: redis::RedisError) -> RedisError {
    if err.is_connection_refusal() || err.is_io_error() {
        RedisError::Connection(err.to_string())
    } else {
        RedisError::Driver(err)
    }
}

/// A live connection to Redis
#[derive(Clone)]
pub enum RedisConnection {
    /// Auto-reconnecting multiplexed connection to a single node
    Managed(ConnectionManager),
    /// Plain multiplexed connection owned by one blocking caller
    Dedicated(MultiplexedConnection),
    /// Cluster-aware connection
    Cluster(ClusterConnection),
}

impl RedisConnection {
    /// Send a single command and decode its reply
    pub async fn query<T: FromRedisValue>(&mut self, cmd: &Cmd) -> redis::RedisResult<T> {
        match self {
            Self::Managed(conn) => cmd.query_async(conn).await,
            Self::Dedicated(conn) => cmd.query_async(conn).await,
            Self::Cluster(conn) => cmd.query_async(conn).await,
        }
    }

    /// Send a pipeline and decode its replies
    pub async fn query_pipeline<T: FromRedisValue>(
        &mut self,
        pipe: &Pipeline,
    ) -> redis::RedisResult<T> {
        match self {
            Self::Managed(conn) => pipe.query_async(conn).await,
            Self::Dedicated(conn) => pipe.query_async(conn).await,
            Self::Cluster(conn) => pipe.query_async(conn).await,
        }
    }
}
