//! Generic key commands

use super::{millis, require_non_empty};
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::{Cmd, ToRedisArgs};
use std::time::Duration;

pub(crate) fn scan_cmd(name: &str, key: Option<&str>, cursor: u64, pattern: &str, count: u64) -> Cmd {
    let mut cmd = redis::cmd(name);
    if let Some(key) = key {
        cmd.arg(key);
    }
    cmd.arg(cursor);
    if !pattern.is_empty() {
        cmd.arg("MATCH").arg(pattern);
    }
    if count > 0 {
        cmd.arg("COUNT").arg(count);
    }
    cmd
}

/// Map a TTL/PTTL reply to a duration; negative replies mean no expiry or no key
pub(crate) fn ttl_from_reply(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds).ok().map(Duration::from_secs)
}

impl Client {
    /// Delete keys, returning how many existed
    pub async fn del<K: ToRedisArgs>(&self, keys: &[K]) -> RedisResult<i64> {
        require_non_empty(keys, "DEL")?;
        self.execute(redis::cmd("DEL").arg(keys)).await
    }

    /// Whether a key exists
    pub async fn exists<K: ToRedisArgs>(&self, key: K) -> RedisResult<bool> {
        let count: i64 = self.execute(redis::cmd("EXISTS").arg(key)).await?;
        Ok(count == 1)
    }

    /// Set a time to live; `false` when the key does not exist
    pub async fn expire<K: ToRedisArgs>(&self, key: K, ttl: Duration) -> RedisResult<bool> {
        let ms = millis(ttl, "EXPIRE")?;
        self.execute(redis::cmd("PEXPIRE").arg(key).arg(ms)).await
    }

    /// Expire at a unix timestamp in seconds
    pub async fn expire_at<K: ToRedisArgs>(&self, key: K, unix_seconds: i64) -> RedisResult<bool> {
        self.execute(redis::cmd("EXPIREAT").arg(key).arg(unix_seconds)).await
    }

    /// Remove a key's time to live
    pub async fn persist<K: ToRedisArgs>(&self, key: K) -> RedisResult<bool> {
        self.execute(redis::cmd("PERSIST").arg(key)).await
    }

    /// Remaining time to live; `None` when the key is missing or never expires
    pub async fn ttl<K: ToRedisArgs>(&self, key: K) -> RedisResult<Option<Duration>> {
        let seconds: i64 = self.execute(redis::cmd("TTL").arg(key)).await?;
        Ok(ttl_from_reply(seconds))
    }

    /// Keys matching a glob pattern
    ///
    /// Walks the whole keyspace; prefer [`Client::scan`] on large databases.
    pub async fn keys(&self, pattern: &str) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("KEYS").arg(pattern)).await
    }

    /// One SCAN step; returns the next cursor and the keys found
    ///
    /// An empty `pattern` or a zero `count` leaves that option out.
    pub async fn scan(&self, cursor: u64, pattern: &str, count: u64) -> RedisResult<(u64, Vec<String>)> {
        self.execute(&scan_cmd("SCAN", None, cursor, pattern, count)).await
    }
}
