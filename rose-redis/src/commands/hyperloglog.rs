//! HyperLogLog commands

use super::require_non_empty;
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::ToRedisArgs;

impl Client {
    /// Add elements; `true` when the estimate changed
    pub async fn pfadd<K: ToRedisArgs, V: ToRedisArgs>(&self, key: K, values: &[V]) -> RedisResult<bool> {
        require_non_empty(values, "PFADD")?;
        self.execute(redis::cmd("PFADD").arg(key).arg(values)).await
    }

    /// Approximate cardinality of the union of one or more keys
    pub async fn pfcount<K: ToRedisArgs>(&self, keys: &[K]) -> RedisResult<i64> {
        require_non_empty(keys, "PFCOUNT")?;
        self.execute(redis::cmd("PFCOUNT").arg(keys)).await
    }

    /// Merge several HyperLogLogs into `dest`
    pub async fn pfmerge<K: ToRedisArgs>(&self, dest: &str, sources: &[K]) -> RedisResult<()> {
        require_non_empty(sources, "PFMERGE")?;
        self.execute(redis::cmd("PFMERGE").arg(dest).arg(sources)).await
    }
}
