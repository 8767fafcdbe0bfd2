//! Redis Streams primitives
//!
//! Thin typed wrappers around the stream commands the consumer-group
//! queue is built on, plus a few inspection helpers.
//!
//! ```no_run
//! use rose_redis::{fields, Client, ConnectionConfig, ReadOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect(ConnectionConfig::new("redis://localhost:6379")).await?;
//!
//! client.xgroup_create_mkstream("events", "processors", "$").await.ok();
//! client
//!     .xadd("events", "*", &fields([("user_id", "123"), ("action", "login")]))
//!     .await?;
//!
//! let messages = client
//!     .xreadgroup("processors", "worker-1", "events", ">", &ReadOptions::non_blocking(10))
//!     .await?;
//! for message in messages {
//!     println!("Processing {}: {:?}", message.id, message.fields);
//!     client.xack("events", "processors", &[message.id.as_str()]).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::core::{
    error::{RedisError, RedisResult},
    value::{write_fields, FieldValue, Fields},
};
use redis::{Cmd, FromRedisValue, RedisWrite, ToRedisArgs, Value};
use std::time::Duration;

/// A single entry read from a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// Server-assigned ID, `<millis>-<seq>`
    pub id: String,
    /// Field map
    pub fields: Fields,
}

impl StreamMessage {
    /// Create a new message
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a field value by name
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Millisecond timestamp part of the ID
    ///
    /// ```
    /// use rose_redis::StreamMessage;
    ///
    /// let message = StreamMessage::new("1234567890123-5", Default::default());
    /// assert_eq!(message.timestamp(), Some(1234567890123));
    /// assert_eq!(message.sequence(), Some(5));
    /// ```
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        self.id.split('-').next()?.parse().ok()
    }

    /// Sequence part of the ID
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.id.split('-').nth(1)?.parse().ok()
    }
}

/// Summary returned by XINFO STREAM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    /// Number of entries
    pub length: u64,
    /// Number of consumer groups
    pub groups: u64,
    /// ID of the first entry
    pub first_entry: Option<String>,
    /// ID of the last entry
    pub last_entry: Option<String>,
    /// Last ID the stream generated
    pub last_generated_id: String,
}

/// Summary form of XPENDING
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSummary {
    /// Delivered but unacknowledged messages in the group
    pub count: u64,
    /// Smallest pending ID
    pub smallest_id: Option<String>,
    /// Largest pending ID
    pub largest_id: Option<String>,
    /// Pending count per consumer
    pub consumers: Vec<(String, u64)>,
}

/// One entry of the extended form of XPENDING
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Message ID
    pub id: String,
    /// Consumer holding the message
    pub consumer: String,
    /// Milliseconds since the last delivery
    pub idle_time: u64,
    /// Number of deliveries
    pub delivery_count: u64,
}

/// ID interval for XRANGE and XPENDING
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRange {
    /// Start ID (inclusive)
    pub start: String,
    /// End ID (inclusive)
    pub end: String,
    /// Maximum number of entries to return
    pub count: Option<u64>,
}

impl StreamRange {
    /// Create a new stream range
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            count: None,
        }
    }

    /// Set the maximum number of entries to return
    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Range covering every entry
    #[must_use]
    pub fn all() -> Self {
        Self::new("-", "+")
    }
}

/// Options for XREADGROUP
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Maximum number of entries to return
    pub count: Option<usize>,
    /// How long to block; `Some(Duration::ZERO)` blocks indefinitely
    pub block: Option<Duration>,
}

impl ReadOptions {
    /// Non-blocking read of at most `count` entries
    #[must_use]
    pub fn non_blocking(count: usize) -> Self {
        Self {
            count: Some(count),
            block: None,
        }
    }

    /// Blocking read of at most `count` entries
    #[must_use]
    pub fn blocking(count: usize, timeout: Duration) -> Self {
        Self {
            count: Some(count),
            block: Some(timeout),
        }
    }
}

/// Adapter writing a field map as `field value ...` arguments
pub(crate) struct FieldArgs<'a>(pub(crate) &'a Fields);

impl ToRedisArgs for FieldArgs<'_> {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        write_fields(self.0, out);
    }
}

pub(crate) fn xadd_cmd(topic: &str, id: &str, fields: &Fields) -> RedisResult<Cmd> {
    if fields.is_empty() {
        return Err(RedisError::Config(format!(
            "Cannot append an empty message to {topic}"
        )));
    }
    let mut cmd = redis::cmd("XADD");
    cmd.arg(topic).arg(id).arg(FieldArgs(fields));
    Ok(cmd)
}

pub(crate) fn xreadgroup_cmd(
    group: &str,
    consumer: &str,
    topic: &str,
    id: &str,
    options: &ReadOptions,
) -> Cmd {
    let mut cmd = redis::cmd("XREADGROUP");
    cmd.arg("GROUP").arg(group).arg(consumer);
    if let Some(count) = options.count {
        cmd.arg("COUNT").arg(count);
    }
    if let Some(block) = options.block {
        cmd.arg("BLOCK").arg(u64::try_from(block.as_millis()).unwrap_or(u64::MAX));
    }
    cmd.arg("STREAMS").arg(topic).arg(id);
    cmd
}

fn text(value: &Value) -> RedisResult<String> {
    Ok(String::from_redis_value(value)?)
}

fn number(value: &Value) -> RedisResult<u64> {
    Ok(u64::from_redis_value(value)?)
}

fn optional_text(value: &Value) -> RedisResult<Option<String>> {
    match value {
        Value::Nil => Ok(None),
        other => text(other).map(Some),
    }
}

fn parse_fields(value: &Value) -> RedisResult<Fields> {
    match value {
        // Entries deleted while pending come back without fields
        Value::Nil => Ok(Fields::new()),
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(RedisError::Type(format!(
                    "Stream entry has an odd number of field items: {}",
                    items.len()
                )));
            }
            items
                .chunks(2)
                .map(|pair| Ok((text(&pair[0])?, FieldValue::from_value(&pair[1])?)))
                .collect()
        }
        Value::Map(pairs) => pairs
            .iter()
            .map(|(k, v)| Ok((text(k)?, FieldValue::from_value(v)?)))
            .collect(),
        other => Err(RedisError::Type(format!(
            "Invalid stream entry field format: {:?}",
            other
        ))),
    }
}

/// Parse the entry list of an XRANGE or XREADGROUP reply
pub fn parse_stream_entries(response: &Value) -> RedisResult<Vec<StreamMessage>> {
    match response {
        Value::Nil => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(entry) if entry.len() == 2 => {
                    Ok(StreamMessage::new(text(&entry[0])?, parse_fields(&entry[1])?))
                }
                other => Err(RedisError::Type(format!(
                    "Invalid stream entry format: {:?}",
                    other
                ))),
            })
            .collect(),
        other => Err(RedisError::Type(format!(
            "Expected array for stream entries, got: {:?}",
            other
        ))),
    }
}

/// Parse an XREAD/XREADGROUP reply into `(stream, entries)` in reply order
///
/// A nil reply (no entries before the block timeout) parses as empty.
pub fn parse_xread_response(response: &Value) -> RedisResult<Vec<(String, Vec<StreamMessage>)>> {
    match response {
        Value::Nil => Ok(Vec::new()),
        Value::Array(streams) => streams
            .iter()
            .map(|stream| match stream {
                Value::Array(data) if data.len() == 2 => {
                    Ok((text(&data[0])?, parse_stream_entries(&data[1])?))
                }
                other => Err(RedisError::Type(format!(
                    "Invalid XREAD response format: {:?}",
                    other
                ))),
            })
            .collect(),
        Value::Map(streams) => streams
            .iter()
            .map(|(name, entries)| Ok((text(name)?, parse_stream_entries(entries)?)))
            .collect(),
        other => Err(RedisError::Type(format!(
            "Expected array or nil for XREAD response, got: {:?}",
            other
        ))),
    }
}

fn key_value_pairs(response: &Value) -> RedisResult<Vec<(&Value, &Value)>> {
    match response {
        Value::Array(items) => Ok(items.chunks(2).filter(|c| c.len() == 2).map(|c| (&c[0], &c[1])).collect()),
        Value::Map(pairs) => Ok(pairs.iter().map(|(k, v)| (k, v)).collect()),
        other => Err(RedisError::Type(format!(
            "Expected key/value reply, got: {:?}",
            other
        ))),
    }
}

fn entry_id(value: &Value) -> RedisResult<Option<String>> {
    match value {
        Value::Array(entry) if !entry.is_empty() => text(&entry[0]).map(Some),
        _ => Ok(None),
    }
}

/// Parse an XINFO STREAM reply
pub fn parse_stream_info(response: &Value) -> RedisResult<StreamInfo> {
    let mut info = StreamInfo::default();
    for (key, value) in key_value_pairs(response)? {
        match text(key)?.as_str() {
            "length" => info.length = number(value)?,
            "groups" => info.groups = number(value)?,
            "first-entry" => info.first_entry = entry_id(value)?,
            "last-entry" => info.last_entry = entry_id(value)?,
            "last-generated-id" => info.last_generated_id = text(value)?,
            _ => {}
        }
    }
    Ok(info)
}

/// Parse the summary form of XPENDING
pub fn parse_pending_summary(response: &Value) -> RedisResult<PendingSummary> {
    let items = match response {
        Value::Array(items) if items.len() == 4 => items,
        other => {
            return Err(RedisError::Type(format!(
                "Invalid XPENDING summary: {:?}",
                other
            )))
        }
    };

    let consumers = match &items[3] {
        Value::Nil => Vec::new(),
        Value::Array(rows) => rows
            .iter()
            .map(|row| match row {
                Value::Array(pair) if pair.len() == 2 => Ok((text(&pair[0])?, number(&pair[1])?)),
                other => Err(RedisError::Type(format!(
                    "Invalid XPENDING consumer row: {:?}",
                    other
                ))),
            })
            .collect::<RedisResult<_>>()?,
        other => {
            return Err(RedisError::Type(format!(
                "Invalid XPENDING consumer list: {:?}",
                other
            )))
        }
    };

    Ok(PendingSummary {
        count: number(&items[0])?,
        smallest_id: optional_text(&items[1])?,
        largest_id: optional_text(&items[2])?,
        consumers,
    })
}

/// Parse the extended form of XPENDING
pub fn parse_pending_range(response: &Value) -> RedisResult<Vec<PendingMessage>> {
    match response {
        Value::Nil => Ok(Vec::new()),
        Value::Array(rows) => rows
            .iter()
            .map(|row| match row {
                Value::Array(fields) if fields.len() == 4 => Ok(PendingMessage {
                    id: text(&fields[0])?,
                    consumer: text(&fields[1])?,
                    idle_time: number(&fields[2])?,
                    delivery_count: number(&fields[3])?,
                }),
                other => Err(RedisError::Type(format!(
                    "Invalid XPENDING entry: {:?}",
                    other
                ))),
            })
            .collect(),
        other => Err(RedisError::Type(format!(
            "Expected array for XPENDING entries, got: {:?}",
            other
        ))),
    }
}

impl Client {
    /// Create a consumer group, creating the stream if it does not exist
    ///
    /// `start` is the first ID the group will deliver after: `0` for the
    /// whole history, `$` for new entries only. An existing group fails with
    /// a `BUSYGROUP` error, see [`RedisError::is_busy_group`].
    pub async fn xgroup_create_mkstream(&self, topic: &str, group: &str, start: &str) -> RedisResult<()> {
        self.execute(
            redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(topic)
                .arg(group)
                .arg(start)
                .arg("MKSTREAM"),
        )
        .await
    }

    /// Append an entry, returning its ID
    ///
    /// Use `"*"` to let the server assign the ID. Empty field maps are
    /// rejected before reaching the server.
    pub async fn xadd(&self, topic: &str, id: &str, fields: &Fields) -> RedisResult<String> {
        self.execute(&xadd_cmd(topic, id, fields)?).await
    }

    /// Read entries as a group consumer
    ///
    /// `id` is `>` for never-delivered entries or an ID to re-read this
    /// consumer's pending entries after it. Blocking reads skip the
    /// operation timeout; run them on a [`Client::dedicated`] client.
    pub async fn xreadgroup(
        &self,
        group: &str,
        consumer: &str,
        topic: &str,
        id: &str,
        options: &ReadOptions,
    ) -> RedisResult<Vec<StreamMessage>> {
        let cmd = xreadgroup_cmd(group, consumer, topic, id, options);
        let reply: Value = if options.block.is_some() {
            self.execute_blocking(&cmd).await?
        } else {
            self.execute(&cmd).await?
        };

        Ok(parse_xread_response(&reply)?
            .into_iter()
            .filter(|(stream, _)| stream == topic)
            .flat_map(|(_, entries)| entries)
            .collect())
    }

    /// Acknowledge entries, returning how many were pending
    pub async fn xack<S: ToRedisArgs>(&self, topic: &str, group: &str, ids: &[S]) -> RedisResult<u64> {
        crate::commands::require_non_empty(ids, "XACK")?;
        self.execute(redis::cmd("XACK").arg(topic).arg(group).arg(ids)).await
    }

    /// Approximately cap a stream's length, returning how many entries were evicted
    pub async fn xtrim_maxlen_approx(&self, topic: &str, max_len: u64) -> RedisResult<u64> {
        self.execute(redis::cmd("XTRIM").arg(topic).arg("MAXLEN").arg("~").arg(max_len))
            .await
    }

    /// Number of entries in a stream; zero for a missing key
    pub async fn xlen(&self, topic: &str) -> RedisResult<u64> {
        self.execute(redis::cmd("XLEN").arg(topic)).await
    }

    /// Pending summary for a group
    pub async fn xpending(&self, topic: &str, group: &str) -> RedisResult<PendingSummary> {
        let reply: Value = self.execute(redis::cmd("XPENDING").arg(topic).arg(group)).await?;
        parse_pending_summary(&reply)
    }

    /// Pending entries of a group, optionally for one consumer
    ///
    /// Returns at most `range.count` entries, 100 when unset.
    pub async fn xpending_range(
        &self,
        topic: &str,
        group: &str,
        range: &StreamRange,
        consumer: Option<&str>,
    ) -> RedisResult<Vec<PendingMessage>> {
        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(topic)
            .arg(group)
            .arg(&range.start)
            .arg(&range.end)
            .arg(range.count.unwrap_or(100));
        if let Some(consumer) = consumer {
            cmd.arg(consumer);
        }
        let reply: Value = self.execute(&cmd).await?;
        parse_pending_range(&reply)
    }

    /// Stream metadata
    pub async fn xinfo_stream(&self, topic: &str) -> RedisResult<StreamInfo> {
        let reply: Value = self.execute(redis::cmd("XINFO").arg("STREAM").arg(topic)).await?;
        parse_stream_info(&reply)
    }

    /// Delete entries, returning how many existed
    pub async fn xdel<S: ToRedisArgs>(&self, topic: &str, ids: &[S]) -> RedisResult<u64> {
        crate::commands::require_non_empty(ids, "XDEL")?;
        self.execute(redis::cmd("XDEL").arg(topic).arg(ids)).await
    }

    /// Entries in an ID range, oldest first
    pub async fn xrange(&self, topic: &str, range: &StreamRange) -> RedisResult<Vec<StreamMessage>> {
        let mut cmd = redis::cmd("XRANGE");
        cmd.arg(topic).arg(&range.start).arg(&range.end);
        if let Some(count) = range.count {
            cmd.arg("COUNT").arg(count);
        }
        let reply: Value = self.execute(&cmd).await?;
        parse_stream_entries(&reply)
    }
}
