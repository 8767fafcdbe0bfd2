//! Set commands

use super::key::scan_cmd;
use super::require_non_empty;
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::ToRedisArgs;

impl Client {
    /// Add members, returning how many were new
    pub async fn sadd<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, members: &[M]) -> RedisResult<i64> {
        require_non_empty(members, "SADD")?;
        self.execute(redis::cmd("SADD").arg(key).arg(members)).await
    }

    /// Remove members, returning how many were present
    pub async fn srem<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, members: &[M]) -> RedisResult<i64> {
        require_non_empty(members, "SREM")?;
        self.execute(redis::cmd("SREM").arg(key).arg(members)).await
    }

    /// Number of members
    pub async fn scard<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("SCARD").arg(key)).await
    }

    /// All members
    pub async fn smembers<K: ToRedisArgs>(&self, key: K) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("SMEMBERS").arg(key)).await
    }

    /// Whether a value is a member
    pub async fn sismember<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, member: M) -> RedisResult<bool> {
        self.execute(redis::cmd("SISMEMBER").arg(key).arg(member)).await
    }

    /// One SSCAN step; returns the next cursor and the members found
    pub async fn sscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> RedisResult<(u64, Vec<String>)> {
        self.execute(&scan_cmd("SSCAN", Some(key), cursor, pattern, count)).await
    }

    /// Members of the first set missing from the others
    pub async fn sdiff<K: ToRedisArgs>(&self, keys: &[K]) -> RedisResult<Vec<String>> {
        require_non_empty(keys, "SDIFF")?;
        self.execute(redis::cmd("SDIFF").arg(keys)).await
    }

    /// Store a difference, returning its size
    pub async fn sdiff_store<D: ToRedisArgs, K: ToRedisArgs>(&self, dest: D, keys: &[K]) -> RedisResult<i64> {
        require_non_empty(keys, "SDIFFSTORE")?;
        self.execute(redis::cmd("SDIFFSTORE").arg(dest).arg(keys)).await
    }

    /// Members common to every set
    pub async fn sinter<K: ToRedisArgs>(&self, keys: &[K]) -> RedisResult<Vec<String>> {
        require_non_empty(keys, "SINTER")?;
        self.execute(redis::cmd("SINTER").arg(keys)).await
    }

    /// Store an intersection, returning its size
    pub async fn sinter_store<D: ToRedisArgs, K: ToRedisArgs>(&self, dest: D, keys: &[K]) -> RedisResult<i64> {
        require_non_empty(keys, "SINTERSTORE")?;
        self.execute(redis::cmd("SINTERSTORE").arg(dest).arg(keys)).await
    }

    /// Members of any set
    pub async fn sunion<K: ToRedisArgs>(&self, keys: &[K]) -> RedisResult<Vec<String>> {
        require_non_empty(keys, "SUNION")?;
        self.execute(redis::cmd("SUNION").arg(keys)).await
    }
}
