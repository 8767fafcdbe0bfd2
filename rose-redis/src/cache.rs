//! Cache-aside helper

use crate::client::Client;
use crate::core::error::{RedisError, RedisResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Pick an expiry uniformly in `[min, max]`, rounded to whole seconds
///
/// Spreading expiries keeps keys loaded together from expiring together.
pub(crate) fn random_ttl(min: Duration, max: Duration) -> RedisResult<Duration> {
    let (min, max) = (min.as_secs(), max.as_secs());
    if min == 0 || min > max {
        return Err(RedisError::Config(format!(
            "Cache expiry range [{min}s, {max}s] is invalid"
        )));
    }
    Ok(Duration::from_secs(rand::thread_rng().gen_range(min..=max)))
}

impl Client {
    /// Return the cached value of `key`, or load, store and return it
    ///
    /// On a miss, `loader` runs and its value is stored with a random TTL
    /// between `min_expire` and `max_expire`. Loader errors are returned as
    /// is and nothing is stored. Redis errors are never treated as a miss.
    pub async fn get_with_cache<F, Fut, E>(
        &self,
        key: &str,
        min_expire: Duration,
        max_expire: Duration,
        loader: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: From<RedisError>,
    {
        let ttl = random_ttl(min_expire, max_expire)?;
        if let Some(cached) = self.get(key).await? {
            return Ok(cached);
        }

        debug!("Cache miss for {}, loading", key);
        let value = loader().await?;
        self.set_ex(key, value.as_str(), ttl).await?;
        Ok(value)
    }
}
