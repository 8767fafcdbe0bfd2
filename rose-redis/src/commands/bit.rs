//! Bitmap commands

use super::require_non_empty;
use crate::client::Client;
use crate::core::error::RedisResult;
use redis::ToRedisArgs;

impl Client {
    /// Read one bit
    pub async fn getbit<K: ToRedisArgs>(&self, key: K, offset: u64) -> RedisResult<bool> {
        self.execute(redis::cmd("GETBIT").arg(key).arg(offset)).await
    }

    /// Write one bit, returning the previous value
    pub async fn setbit<K: ToRedisArgs>(&self, key: K, offset: u64, value: bool) -> RedisResult<bool> {
        self.execute(redis::cmd("SETBIT").arg(key).arg(offset).arg(u8::from(value)))
            .await
    }

    /// Count set bits, optionally within an inclusive byte range
    pub async fn bitcount<K: ToRedisArgs>(&self, key: K, range: Option<(i64, i64)>) -> RedisResult<i64> {
        let mut cmd = redis::cmd("BITCOUNT");
        cmd.arg(key);
        if let Some((start, end)) = range {
            cmd.arg(start).arg(end);
        }
        self.execute(&cmd).await
    }

    /// Position of the first bit equal to `bit`, searching an optional byte range
    pub async fn bitpos<K: ToRedisArgs>(&self, key: K, bit: bool, range: Option<(i64, i64)>) -> RedisResult<i64> {
        let mut cmd = redis::cmd("BITPOS");
        cmd.arg(key).arg(u8::from(bit));
        if let Some((start, end)) = range {
            cmd.arg(start).arg(end);
        }
        self.execute(&cmd).await
    }

    /// Store the AND of several bitmaps, returning the result length in bytes
    pub async fn bitop_and<K: ToRedisArgs>(&self, dest: &str, keys: &[K]) -> RedisResult<i64> {
        self.bitop("AND", dest, keys).await
    }

    /// Store the OR of several bitmaps
    pub async fn bitop_or<K: ToRedisArgs>(&self, dest: &str, keys: &[K]) -> RedisResult<i64> {
        self.bitop("OR", dest, keys).await
    }

    /// Store the XOR of several bitmaps
    pub async fn bitop_xor<K: ToRedisArgs>(&self, dest: &str, keys: &[K]) -> RedisResult<i64> {
        self.bitop("XOR", dest, keys).await
    }

    /// Store the inverse of a bitmap
    pub async fn bitop_not<K: ToRedisArgs>(&self, dest: &str, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("BITOP").arg("NOT").arg(dest).arg(key)).await
    }

    async fn bitop<K: ToRedisArgs>(&self, op: &str, dest: &str, keys: &[K]) -> RedisResult<i64> {
        require_non_empty(keys, "BITOP")?;
        self.execute(redis::cmd("BITOP").arg(op).arg(dest).arg(keys)).await
    }
}
