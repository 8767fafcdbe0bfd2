//! String commands

use super::{millis, require_non_empty};
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::{Cmd, ToRedisArgs};
use std::time::Duration;

pub(crate) fn set_ex_cmd<K, V>(key: K, value: V, ttl: Duration) -> RedisResult<Cmd>
where
    K: ToRedisArgs,
    V: ToRedisArgs,
{
    let ms = millis(ttl, "SET expiry")?;
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value).arg("PX").arg(ms);
    Ok(cmd)
}

impl Client {
    /// Set a string value
    pub async fn set<K: ToRedisArgs, V: ToRedisArgs>(&self, key: K, value: V) -> RedisResult<()> {
        self.execute(redis::cmd("SET").arg(key).arg(value)).await
    }

    /// Get a string value, `None` when the key is missing
    pub async fn get<K: ToRedisArgs>(&self, key: K) -> RedisResult<Option<String>> {
        self.execute(redis::cmd("GET").arg(key)).await
    }

    /// Set a value and return the previous one
    pub async fn get_set<K: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        value: V,
    ) -> RedisResult<Option<String>> {
        self.execute(redis::cmd("GETSET").arg(key).arg(value)).await
    }

    /// Get several values; missing keys map to `None`
    pub async fn mget<K: ToRedisArgs>(&self, keys: &[K]) -> RedisResult<Vec<Option<String>>> {
        require_non_empty(keys, "MGET")?;
        self.execute(redis::cmd("MGET").arg(keys)).await
    }

    /// Set several key/value pairs
    pub async fn mset<K: ToRedisArgs, V: ToRedisArgs>(&self, pairs: &[(K, V)]) -> RedisResult<()> {
        require_non_empty(pairs, "MSET")?;
        self.execute(redis::cmd("MSET").arg(pairs)).await
    }

    /// Set several pairs only if none of the keys exist
    pub async fn msetnx<K: ToRedisArgs, V: ToRedisArgs>(
        &self,
        pairs: &[(K, V)],
    ) -> RedisResult<bool> {
        require_non_empty(pairs, "MSETNX")?;
        self.execute(redis::cmd("MSETNX").arg(pairs)).await
    }

    /// Set a value with a time to live
    pub async fn set_ex<K: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        value: V,
        ttl: Duration,
    ) -> RedisResult<()> {
        self.execute(&set_ex_cmd(key, value, ttl)?).await
    }

    /// Set a value only if the key does not exist
    pub async fn set_nx<K: ToRedisArgs, V: ToRedisArgs>(&self, key: K, value: V) -> RedisResult<bool> {
        self.execute(redis::cmd("SETNX").arg(key).arg(value)).await
    }

    /// Set a value with a time to live, only if the key does not exist
    pub async fn set_nx_ex<K: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        value: V,
        ttl: Duration,
    ) -> RedisResult<bool> {
        let mut cmd = set_ex_cmd(key, value, ttl)?;
        cmd.arg("NX");
        let reply: Option<String> = self.execute(&cmd).await?;
        Ok(reply.is_some())
    }

    /// Increment an integer value by one
    pub async fn incr<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("INCR").arg(key)).await
    }

    /// Increment an integer value
    pub async fn incr_by<K: ToRedisArgs>(&self, key: K, delta: i64) -> RedisResult<i64> {
        self.execute(redis::cmd("INCRBY").arg(key).arg(delta)).await
    }

    /// Increment a float value
    pub async fn incr_by_float<K: ToRedisArgs>(&self, key: K, delta: f64) -> RedisResult<f64> {
        self.execute(redis::cmd("INCRBYFLOAT").arg(key).arg(delta)).await
    }

    /// Decrement an integer value by one
    pub async fn decr<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("DECR").arg(key)).await
    }

    /// Decrement an integer value
    pub async fn decr_by<K: ToRedisArgs>(&self, key: K, delta: i64) -> RedisResult<i64> {
        self.execute(redis::cmd("DECRBY").arg(key).arg(delta)).await
    }

    /// Append to a string, returning the new length
    pub async fn append<K: ToRedisArgs, V: ToRedisArgs>(&self, key: K, value: V) -> RedisResult<i64> {
        self.execute(redis::cmd("APPEND").arg(key).arg(value)).await
    }

    /// Length of a string value
    pub async fn strlen<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("STRLEN").arg(key)).await
    }
}
