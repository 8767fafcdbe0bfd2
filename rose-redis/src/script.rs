//! Lua scripting support
//!
//! Scripts run with `EVAL`/`EVALSHA`. A [`Script`] hashes its source locally
//! so the common path sends only the SHA1 and falls back to the full source
//! when the server answers `NOSCRIPT`.
//!
//! ```no_run
//! use rose_redis::{Client, ConnectionConfig, Script};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect(ConnectionConfig::new("redis://localhost:6379")).await?;
//!
//! let script = Script::new("return redis.call('INCRBY', KEYS[1], ARGV[1])");
//! let value: i64 = script.execute(&client, &["counter"], &["5"]).await?;
//! println!("counter = {value}");
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::core::error::RedisResult;
use redis::{Cmd, FromRedisValue};
use sha1::{Digest, Sha1};
use tracing::debug;

/// A Lua script identified by the SHA1 of its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    source: String,
    sha: String,
}

impl Script {
    /// Create a script and compute its SHA1
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let sha = calculate_sha1(&source);
        Self { source, sha }
    }

    /// Hex SHA1 of the source, as `EVALSHA` expects it
    #[must_use]
    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Lua source
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the script, sending the source only if the server lacks it
    pub async fn execute<T: FromRedisValue>(
        &self,
        client: &Client,
        keys: &[&str],
        args: &[&str],
    ) -> RedisResult<T> {
        match client.evalsha(&self.sha, keys, args).await {
            Err(e) if e.is_no_script() => {
                debug!("Script {} not cached, falling back to EVAL", self.sha);
                client.eval(&self.source, keys, args).await
            }
            other => other,
        }
    }

    /// Load the script into the server cache, returning its SHA1
    pub async fn load(&self, client: &Client) -> RedisResult<String> {
        client.script_load(&self.source).await
    }
}

fn calculate_sha1(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn script_cmd(name: &str, script: &str, keys: &[&str], args: &[&str]) -> Cmd {
    let mut cmd = redis::cmd(name);
    cmd.arg(script).arg(keys.len()).arg(keys).arg(args);
    cmd
}

impl Client {
    /// Evaluate a Lua script
    pub async fn eval<T: FromRedisValue>(&self, source: &str, keys: &[&str], args: &[&str]) -> RedisResult<T> {
        self.execute(&script_cmd("EVAL", source, keys, args)).await
    }

    /// Evaluate a cached script by SHA1
    ///
    /// Fails with a `NOSCRIPT` error when the server does not know the script;
    /// see [`RedisError::is_no_script`](crate::core::error::RedisError::is_no_script).
    pub async fn evalsha<T: FromRedisValue>(&self, sha: &str, keys: &[&str], args: &[&str]) -> RedisResult<T> {
        self.execute(&script_cmd("EVALSHA", sha, keys, args)).await
    }

    /// Cache a script on the server, returning its SHA1
    pub async fn script_load(&self, source: &str) -> RedisResult<String> {
        self.execute(redis::cmd("SCRIPT").arg("LOAD").arg(source)).await
    }

    /// Which of the given SHA1s the server has cached
    pub async fn script_exists(&self, shas: &[&str]) -> RedisResult<Vec<bool>> {
        self.execute(redis::cmd("SCRIPT").arg("EXISTS").arg(shas)).await
    }
}
