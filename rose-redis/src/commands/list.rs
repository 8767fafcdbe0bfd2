//! List commands
//!
//! `blpop`/`brpop` block server-side, so they run on a dedicated connection
//! rather than the shared one.

use super::require_non_empty;
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::{Cmd, ToRedisArgs};
use std::time::Duration;

pub(crate) fn blocking_pop_cmd<K: ToRedisArgs>(name: &str, keys: &[K], timeout: Duration) -> Cmd {
    let mut cmd = redis::cmd(name);
    // Seconds with millisecond precision; zero waits forever.
    let seconds = match timeout.subsec_millis() {
        0 => timeout.as_secs().to_string(),
        ms => format!("{}.{:03}", timeout.as_secs(), ms),
    };
    cmd.arg(keys).arg(seconds);
    cmd
}

impl Client {
    /// Length of a list
    pub async fn llen<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("LLEN").arg(key)).await
    }

    /// Element at an index
    pub async fn lindex<K: ToRedisArgs>(&self, key: K, index: i64) -> RedisResult<Option<String>> {
        self.execute(redis::cmd("LINDEX").arg(key).arg(index)).await
    }

    /// Pop from the head
    pub async fn lpop<K: ToRedisArgs>(&self, key: K) -> RedisResult<Option<String>> {
        self.execute(redis::cmd("LPOP").arg(key)).await
    }

    /// Pop up to `count` elements from the head
    pub async fn lpop_count<K: ToRedisArgs>(&self, key: K, count: usize) -> RedisResult<Vec<String>> {
        let popped: Option<Vec<String>> =
            self.execute(redis::cmd("LPOP").arg(key).arg(count)).await?;
        Ok(popped.unwrap_or_default())
    }

    /// Pop from the tail
    pub async fn rpop<K: ToRedisArgs>(&self, key: K) -> RedisResult<Option<String>> {
        self.execute(redis::cmd("RPOP").arg(key)).await
    }

    /// Push to the head, returning the new length
    pub async fn lpush<K: ToRedisArgs, V: ToRedisArgs>(&self, key: K, values: &[V]) -> RedisResult<i64> {
        require_non_empty(values, "LPUSH")?;
        self.execute(redis::cmd("LPUSH").arg(key).arg(values)).await
    }

    /// Push to the tail, returning the new length
    pub async fn rpush<K: ToRedisArgs, V: ToRedisArgs>(&self, key: K, values: &[V]) -> RedisResult<i64> {
        require_non_empty(values, "RPUSH")?;
        self.execute(redis::cmd("RPUSH").arg(key).arg(values)).await
    }

    /// Elements between two inclusive indexes
    pub async fn lrange<K: ToRedisArgs>(&self, key: K, start: i64, stop: i64) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("LRANGE").arg(key).arg(start).arg(stop)).await
    }

    /// Remove occurrences of a value, returning how many were removed
    pub async fn lrem<K: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        count: i64,
        value: V,
    ) -> RedisResult<i64> {
        self.execute(redis::cmd("LREM").arg(key).arg(count).arg(value)).await
    }

    /// Trim a list to the inclusive index range
    pub async fn ltrim<K: ToRedisArgs>(&self, key: K, start: i64, stop: i64) -> RedisResult<()> {
        self.execute(redis::cmd("LTRIM").arg(key).arg(start).arg(stop)).await
    }

    /// Blocking pop from the head of the first non-empty list
    ///
    /// Returns `(list, element)`, or `None` when `timeout` elapses.
    /// A zero timeout waits indefinitely.
    pub async fn blpop<K: ToRedisArgs>(
        &self,
        keys: &[K],
        timeout: Duration,
    ) -> RedisResult<Option<(String, String)>> {
        require_non_empty(keys, "BLPOP")?;
        let conn = self.dedicated().await?;
        conn.execute_blocking(&blocking_pop_cmd("BLPOP", keys, timeout)).await
    }

    /// Blocking pop from the tail of the first non-empty list
    pub async fn brpop<K: ToRedisArgs>(
        &self,
        keys: &[K],
        timeout: Duration,
    ) -> RedisResult<Option<(String, String)>> {
        require_non_empty(keys, "BRPOP")?;
        let conn = self.dedicated().await?;
        conn.execute_blocking(&blocking_pop_cmd("BRPOP", keys, timeout)).await
    }
}
