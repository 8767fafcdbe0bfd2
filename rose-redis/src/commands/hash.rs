//! Hash commands

use super::key::scan_cmd;
use super::require_non_empty;
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::ToRedisArgs;
use std::collections::HashMap;

impl Client {
    /// Delete fields; `true` when at least one was removed
    pub async fn hdel<K: ToRedisArgs, F: ToRedisArgs>(&self, key: K, fields: &[F]) -> RedisResult<bool> {
        require_non_empty(fields, "HDEL")?;
        let removed: i64 = self.execute(redis::cmd("HDEL").arg(key).arg(fields)).await?;
        Ok(removed >= 1)
    }

    /// Whether a field exists
    pub async fn hexists<K: ToRedisArgs, F: ToRedisArgs>(&self, key: K, field: F) -> RedisResult<bool> {
        self.execute(redis::cmd("HEXISTS").arg(key).arg(field)).await
    }

    /// Get a field value
    pub async fn hget<K: ToRedisArgs, F: ToRedisArgs>(
        &self,
        key: K,
        field: F,
    ) -> RedisResult<Option<String>> {
        self.execute(redis::cmd("HGET").arg(key).arg(field)).await
    }

    /// Get every field and value
    pub async fn hgetall<K: ToRedisArgs>(&self, key: K) -> RedisResult<HashMap<String, String>> {
        self.execute(redis::cmd("HGETALL").arg(key)).await
    }

    /// Increment an integer field
    pub async fn hincr_by<K: ToRedisArgs, F: ToRedisArgs>(
        &self,
        key: K,
        field: F,
        delta: i64,
    ) -> RedisResult<i64> {
        self.execute(redis::cmd("HINCRBY").arg(key).arg(field).arg(delta)).await
    }

    /// Increment a float field
    pub async fn hincr_by_float<K: ToRedisArgs, F: ToRedisArgs>(
        &self,
        key: K,
        field: F,
        delta: f64,
    ) -> RedisResult<f64> {
        self.execute(redis::cmd("HINCRBYFLOAT").arg(key).arg(field).arg(delta))
            .await
    }

    /// Field names
    pub async fn hkeys<K: ToRedisArgs>(&self, key: K) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("HKEYS").arg(key)).await
    }

    /// Field values
    pub async fn hvals<K: ToRedisArgs>(&self, key: K) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("HVALS").arg(key)).await
    }

    /// Number of fields
    pub async fn hlen<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("HLEN").arg(key)).await
    }

    /// Get several fields; missing ones map to `None`
    pub async fn hmget<K: ToRedisArgs, F: ToRedisArgs>(
        &self,
        key: K,
        fields: &[F],
    ) -> RedisResult<Vec<Option<String>>> {
        require_non_empty(fields, "HMGET")?;
        self.execute(redis::cmd("HMGET").arg(key).arg(fields)).await
    }

    /// Set several fields at once
    pub async fn hmset<K: ToRedisArgs, F: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        pairs: &[(F, V)],
    ) -> RedisResult<()> {
        require_non_empty(pairs, "HSET")?;
        let _added: i64 = self.execute(redis::cmd("HSET").arg(key).arg(pairs)).await?;
        Ok(())
    }

    /// Set a field; `true` when the field is new
    pub async fn hset<K: ToRedisArgs, F: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        field: F,
        value: V,
    ) -> RedisResult<bool> {
        self.execute(redis::cmd("HSET").arg(key).arg(field).arg(value)).await
    }

    /// Set a field only if it does not exist
    pub async fn hsetnx<K: ToRedisArgs, F: ToRedisArgs, V: ToRedisArgs>(
        &self,
        key: K,
        field: F,
        value: V,
    ) -> RedisResult<bool> {
        self.execute(redis::cmd("HSETNX").arg(key).arg(field).arg(value)).await
    }

    /// One HSCAN step; returns the next cursor and field/value pairs
    pub async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> RedisResult<(u64, Vec<(String, String)>)> {
        self.execute(&scan_cmd("HSCAN", Some(key), cursor, pattern, count)).await
    }
}
