//! Typed command wrappers, one module per Redis data type
//!
//! Every wrapper forwards to the driver and reshapes the reply: integer
//! flags become `bool`, nil becomes `None`, score lists become
//! [`Pair`](crate::core::types::Pair) values.

pub mod bit;
pub mod geo;
pub mod hash;
pub mod hyperloglog;
pub mod key;
pub mod list;
pub mod set;
pub mod sorted_set;
pub mod string;

use crate::core::error::{RedisError, RedisResult};
use std::time::Duration;

/// Reject empty argument lists that Redis would answer with a syntax error
pub(crate) fn require_non_empty<T>(items: &[T], what: &str) -> RedisResult<()> {
    if items.is_empty() {
        return Err(RedisError::Config(format!("{what} requires at least one argument")));
    }
    Ok(())
}

/// Convert a positive duration to whole milliseconds
pub(crate) fn millis(duration: Duration, what: &str) -> RedisResult<u64> {
    let ms = duration.as_millis();
    if ms == 0 {
        return Err(RedisError::Config(format!(
            "{what} must be at least one millisecond"
        )));
    }
    Ok(u64::try_from(ms).unwrap_or(u64::MAX))
}

/// Render a command's arguments as text for assertions
#[cfg(test)]
pub(crate) fn render(cmd: &redis::Cmd) -> Vec<String> {
    cmd.args_iter()
        .map(|arg| match arg {
            redis::Arg::Simple(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            redis::Arg::Cursor => "<cursor>".to_string(),
        })
        .collect()
}
