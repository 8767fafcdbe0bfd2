//! Sorted set commands
//!
//! Integer-score variants truncate scores toward zero; the `_float`
//! variants keep the score as stored.

use super::key::scan_cmd;
use super::require_non_empty;
use crate::client::Client;
use crate::core::error::{RedisError, RedisResult};
use crate::core::types::{FloatPair, Pair, ScoreRange, ZStore};
use redis::{Cmd, ToRedisArgs};

/// Build a ZRANGEBYSCORE-family command
///
/// Reverse ranges take their bounds as `max min`.
pub(crate) fn range_by_score_cmd(key: &str, range: &ScoreRange, rev: bool, with_scores: bool) -> Cmd {
    let mut cmd = if rev {
        let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
        cmd.arg(key).arg(&range.max).arg(&range.min);
        cmd
    } else {
        let mut cmd = redis::cmd("ZRANGEBYSCORE");
        cmd.arg(key).arg(&range.min).arg(&range.max);
        cmd
    };
    if with_scores {
        cmd.arg("WITHSCORES");
    }
    if let Some((offset, count)) = range.limit {
        cmd.arg("LIMIT").arg(offset).arg(count);
    }
    cmd
}

pub(crate) fn zunion_store_cmd(dest: &str, store: &ZStore) -> RedisResult<Cmd> {
    require_non_empty(&store.keys, "ZUNIONSTORE")?;
    if !store.weights.is_empty() && store.weights.len() != store.keys.len() {
        return Err(RedisError::Config(format!(
            "ZUNIONSTORE got {} weights for {} keys",
            store.weights.len(),
            store.keys.len()
        )));
    }

    let mut cmd = redis::cmd("ZUNIONSTORE");
    cmd.arg(dest).arg(store.keys.len()).arg(&store.keys);
    if !store.weights.is_empty() {
        cmd.arg("WEIGHTS");
        for weight in &store.weights {
            cmd.arg(weight.to_string());
        }
    }
    cmd.arg("AGGREGATE").arg(store.aggregate.as_str());
    Ok(cmd)
}

fn to_float_pairs(raw: Vec<(String, f64)>) -> Vec<FloatPair> {
    raw.into_iter()
        .map(|(member, score)| FloatPair::new(member, score))
        .collect()
}

fn to_pairs(raw: Vec<(String, f64)>) -> Vec<Pair> {
    to_float_pairs(raw).into_iter().map(Pair::from).collect()
}

impl Client {
    /// Add a member with an integer score; `true` when the member is new
    pub async fn zadd<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, score: i64, member: M) -> RedisResult<bool> {
        let added: i64 = self.execute(redis::cmd("ZADD").arg(key).arg(score).arg(member)).await?;
        Ok(added == 1)
    }

    /// Add a member with a float score; `true` when the member is new
    pub async fn zadd_float<K: ToRedisArgs, M: ToRedisArgs>(
        &self,
        key: K,
        score: f64,
        member: M,
    ) -> RedisResult<bool> {
        let added: i64 = self
            .execute(redis::cmd("ZADD").arg(key).arg(score.to_string()).arg(member))
            .await?;
        Ok(added == 1)
    }

    /// Add several members, returning how many were new
    pub async fn zadds<K: ToRedisArgs>(&self, key: K, pairs: &[Pair]) -> RedisResult<i64> {
        require_non_empty(pairs, "ZADD")?;
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key);
        for pair in pairs {
            cmd.arg(pair.score).arg(&pair.member);
        }
        self.execute(&cmd).await
    }

    /// Number of members
    pub async fn zcard<K: ToRedisArgs>(&self, key: K) -> RedisResult<i64> {
        self.execute(redis::cmd("ZCARD").arg(key)).await
    }

    /// Number of members with a score inside the range
    pub async fn zcount(&self, key: &str, range: &ScoreRange) -> RedisResult<i64> {
        self.execute(redis::cmd("ZCOUNT").arg(key).arg(&range.min).arg(&range.max))
            .await
    }

    /// Increment a member's score, returning the truncated new score
    pub async fn zincr_by<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, delta: i64, member: M) -> RedisResult<i64> {
        let score = self.zincr_by_float(key, delta as f64, member).await?;
        Ok(score as i64)
    }

    /// Increment a member's score by a float
    pub async fn zincr_by_float<K: ToRedisArgs, M: ToRedisArgs>(
        &self,
        key: K,
        delta: f64,
        member: M,
    ) -> RedisResult<f64> {
        self.execute(redis::cmd("ZINCRBY").arg(key).arg(delta.to_string()).arg(member))
            .await
    }

    /// A member's truncated score
    pub async fn zscore<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, member: M) -> RedisResult<Option<i64>> {
        let score = self.zscore_float(key, member).await?;
        Ok(score.map(|s| s as i64))
    }

    /// A member's score
    pub async fn zscore_float<K: ToRedisArgs, M: ToRedisArgs>(
        &self,
        key: K,
        member: M,
    ) -> RedisResult<Option<f64>> {
        self.execute(redis::cmd("ZSCORE").arg(key).arg(member)).await
    }

    /// Rank by ascending score
    pub async fn zrank<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, member: M) -> RedisResult<Option<i64>> {
        self.execute(redis::cmd("ZRANK").arg(key).arg(member)).await
    }

    /// Rank by descending score
    pub async fn zrevrank<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, member: M) -> RedisResult<Option<i64>> {
        self.execute(redis::cmd("ZREVRANK").arg(key).arg(member)).await
    }

    /// Remove members, returning how many were present
    pub async fn zrem<K: ToRedisArgs, M: ToRedisArgs>(&self, key: K, members: &[M]) -> RedisResult<i64> {
        require_non_empty(members, "ZREM")?;
        self.execute(redis::cmd("ZREM").arg(key).arg(members)).await
    }

    /// Remove members with a score inside the range
    pub async fn zrem_range_by_score(&self, key: &str, range: &ScoreRange) -> RedisResult<i64> {
        self.execute(
            redis::cmd("ZREMRANGEBYSCORE")
                .arg(key)
                .arg(&range.min)
                .arg(&range.max),
        )
        .await
    }

    /// Remove members between two inclusive ranks
    pub async fn zrem_range_by_rank<K: ToRedisArgs>(&self, key: K, start: i64, stop: i64) -> RedisResult<i64> {
        self.execute(redis::cmd("ZREMRANGEBYRANK").arg(key).arg(start).arg(stop))
            .await
    }

    /// Members between two ranks, lowest score first
    pub async fn zrange<K: ToRedisArgs>(&self, key: K, start: i64, stop: i64) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("ZRANGE").arg(key).arg(start).arg(stop)).await
    }

    /// Members between two ranks, highest score first
    pub async fn zrevrange<K: ToRedisArgs>(&self, key: K, start: i64, stop: i64) -> RedisResult<Vec<String>> {
        self.execute(redis::cmd("ZREVRANGE").arg(key).arg(start).arg(stop)).await
    }

    /// Members and truncated scores between two ranks
    pub async fn zrange_with_scores<K: ToRedisArgs>(&self, key: K, start: i64, stop: i64) -> RedisResult<Vec<Pair>> {
        let raw = self.zrange_raw("ZRANGE", key, start, stop).await?;
        Ok(to_pairs(raw))
    }

    /// Members and scores between two ranks
    pub async fn zrange_with_scores_float<K: ToRedisArgs>(
        &self,
        key: K,
        start: i64,
        stop: i64,
    ) -> RedisResult<Vec<FloatPair>> {
        let raw = self.zrange_raw("ZRANGE", key, start, stop).await?;
        Ok(to_float_pairs(raw))
    }

    /// Members and truncated scores between two ranks, highest first
    pub async fn zrevrange_with_scores<K: ToRedisArgs>(
        &self,
        key: K,
        start: i64,
        stop: i64,
    ) -> RedisResult<Vec<Pair>> {
        let raw = self.zrange_raw("ZREVRANGE", key, start, stop).await?;
        Ok(to_pairs(raw))
    }

    /// Members and scores between two ranks, highest first
    pub async fn zrevrange_with_scores_float<K: ToRedisArgs>(
        &self,
        key: K,
        start: i64,
        stop: i64,
    ) -> RedisResult<Vec<FloatPair>> {
        let raw = self.zrange_raw("ZREVRANGE", key, start, stop).await?;
        Ok(to_float_pairs(raw))
    }

    /// Members inside a score range, lowest first
    pub async fn zrange_by_score(&self, key: &str, range: &ScoreRange) -> RedisResult<Vec<String>> {
        self.execute(&range_by_score_cmd(key, range, false, false)).await
    }

    /// Members and truncated scores inside a score range, lowest first
    pub async fn zrange_by_score_with_scores(&self, key: &str, range: &ScoreRange) -> RedisResult<Vec<Pair>> {
        let raw = self.execute(&range_by_score_cmd(key, range, false, true)).await?;
        Ok(to_pairs(raw))
    }

    /// Members and scores inside a score range, lowest first
    pub async fn zrange_by_score_with_scores_float(
        &self,
        key: &str,
        range: &ScoreRange,
    ) -> RedisResult<Vec<FloatPair>> {
        let raw = self.execute(&range_by_score_cmd(key, range, false, true)).await?;
        Ok(to_float_pairs(raw))
    }

    /// Members and truncated scores inside a score range, highest first
    pub async fn zrevrange_by_score_with_scores(&self, key: &str, range: &ScoreRange) -> RedisResult<Vec<Pair>> {
        let raw = self.execute(&range_by_score_cmd(key, range, true, true)).await?;
        Ok(to_pairs(raw))
    }

    /// Members and scores inside a score range, highest first
    pub async fn zrevrange_by_score_with_scores_float(
        &self,
        key: &str,
        range: &ScoreRange,
    ) -> RedisResult<Vec<FloatPair>> {
        let raw = self.execute(&range_by_score_cmd(key, range, true, true)).await?;
        Ok(to_float_pairs(raw))
    }

    /// One ZSCAN step; returns the next cursor and member/score pairs
    pub async fn zscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> RedisResult<(u64, Vec<FloatPair>)> {
        let (next, raw): (u64, Vec<(String, f64)>) = self
            .execute(&scan_cmd("ZSCAN", Some(key), cursor, pattern, count))
            .await?;
        Ok((next, to_float_pairs(raw)))
    }

    /// Store the union of several sorted sets, returning its size
    pub async fn zunion_store(&self, dest: &str, store: &ZStore) -> RedisResult<i64> {
        self.execute(&zunion_store_cmd(dest, store)?).await
    }

    async fn zrange_raw<K: ToRedisArgs>(
        &self,
        name: &str,
        key: K,
        start: i64,
        stop: i64,
    ) -> RedisResult<Vec<(String, f64)>> {
        self.execute(redis::cmd(name).arg(key).arg(start).arg(stop).arg("WITHSCORES"))
            .await
    }
}
