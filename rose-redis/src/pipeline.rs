//! Pipeline support for batching Redis commands
//!
//! Queued commands are sent in one round trip and their replies come back in
//! order.
//!
//! ```no_run
//! use rose_redis::{Client, ConnectionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect(ConnectionConfig::new("redis://localhost:6379")).await?;
//!
//! let mut pipeline = client.pipeline();
//! pipeline.set("key1", "value1").incr("counter").get("key1");
//! let (_, count, value): ((), i64, Option<String>) = pipeline.execute().await?;
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::core::error::RedisResult;
use crate::core::value::Fields;
use crate::streams::FieldArgs;
use redis::{Cmd, FromRedisValue, ToRedisArgs, Value};
use std::time::Duration;

/// A batch of commands executed in one round trip
pub struct Pipeline {
    client: Client,
    inner: redis::Pipeline,
    len: usize,
}

impl Pipeline {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            inner: redis::pipe(),
            len: 0,
        }
    }

    /// Wrap the batch in `MULTI`/`EXEC`
    pub fn atomic(&mut self) -> &mut Self {
        self.inner.atomic();
        self
    }

    /// Queue an arbitrary command
    pub fn cmd(&mut self, cmd: Cmd) -> &mut Self {
        self.inner.add_command(cmd);
        self.len += 1;
        self
    }

    /// Queue a SET
    pub fn set<K: ToRedisArgs, V: ToRedisArgs>(&mut self, key: K, value: V) -> &mut Self {
        self.cmd(redis::cmd("SET").arg(key).arg(value).clone())
    }

    /// Queue a GET
    pub fn get<K: ToRedisArgs>(&mut self, key: K) -> &mut Self {
        self.cmd(redis::cmd("GET").arg(key).clone())
    }

    /// Queue a DEL
    pub fn del<K: ToRedisArgs>(&mut self, keys: &[K]) -> &mut Self {
        self.cmd(redis::cmd("DEL").arg(keys).clone())
    }

    /// Queue an INCR
    pub fn incr<K: ToRedisArgs>(&mut self, key: K) -> &mut Self {
        self.cmd(redis::cmd("INCR").arg(key).clone())
    }

    /// Queue an INCRBY
    pub fn incr_by<K: ToRedisArgs>(&mut self, key: K, delta: i64) -> &mut Self {
        self.cmd(redis::cmd("INCRBY").arg(key).arg(delta).clone())
    }

    /// Queue a PEXPIRE
    pub fn expire<K: ToRedisArgs>(&mut self, key: K, ttl: Duration) -> &mut Self {
        let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.cmd(redis::cmd("PEXPIRE").arg(key).arg(ms).clone())
    }

    /// Queue an HSET of one field
    pub fn hset<K: ToRedisArgs, F: ToRedisArgs, V: ToRedisArgs>(&mut self, key: K, field: F, value: V) -> &mut Self {
        self.cmd(redis::cmd("HSET").arg(key).arg(field).arg(value).clone())
    }

    /// Queue an HGET
    pub fn hget<K: ToRedisArgs, F: ToRedisArgs>(&mut self, key: K, field: F) -> &mut Self {
        self.cmd(redis::cmd("HGET").arg(key).arg(field).clone())
    }

    /// Queue an RPUSH
    pub fn rpush<K: ToRedisArgs, V: ToRedisArgs>(&mut self, key: K, values: &[V]) -> &mut Self {
        self.cmd(redis::cmd("RPUSH").arg(key).arg(values).clone())
    }

    /// Queue an SADD
    pub fn sadd<K: ToRedisArgs, M: ToRedisArgs>(&mut self, key: K, members: &[M]) -> &mut Self {
        self.cmd(redis::cmd("SADD").arg(key).arg(members).clone())
    }

    /// Queue a ZADD of one member
    pub fn zadd<K: ToRedisArgs, M: ToRedisArgs>(&mut self, key: K, score: i64, member: M) -> &mut Self {
        self.cmd(redis::cmd("ZADD").arg(key).arg(score).arg(member).clone())
    }

    /// Queue an `XADD topic *` of a field map
    pub fn xadd(&mut self, topic: &str, fields: &Fields) -> &mut Self {
        self.cmd(redis::cmd("XADD").arg(topic).arg("*").arg(FieldArgs(fields)).clone())
    }

    /// Number of queued commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Send the batch and decode the replies, typically into a tuple
    pub async fn execute<T: FromRedisValue>(&self) -> RedisResult<T> {
        self.client.execute_pipeline(&self.inner).await
    }

    /// Send the batch and return the raw replies in order
    pub async fn execute_raw(&self) -> RedisResult<Vec<Value>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.client.execute_pipeline(&self.inner).await
    }
}

impl Client {
    /// Start an empty pipeline on this client's connection
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.clone())
    }

    /// Fill a pipeline with `build`, send it and return the raw replies
    pub async fn pipelined<F>(&self, build: F) -> RedisResult<Vec<Value>>
    where
        F: FnOnce(&mut Pipeline),
    {
        let mut pipeline = self.pipeline();
        build(&mut pipeline);
        pipeline.execute_raw().await
    }
}
