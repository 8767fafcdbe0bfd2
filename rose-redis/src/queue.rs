//! Stream consumer-group queue
//!
//! [`StreamQueue`] turns a Redis stream plus a consumer group into a work
//! queue. Each [`StreamQueue::consume`] call bootstraps the group and spawns
//! one background task that:
//!
//! 1. reads up to `batch_size` never-delivered entries with
//!    `XREADGROUP ... BLOCK 0 ... >` on its own connection,
//! 2. hands every entry to the handler, in order, one at a time,
//! 3. acknowledges an entry as soon as its handler succeeds.
//!
//! Handler failures are resolved by the consumer's [`FailurePolicy`]. Read
//! failures reconnect with exponential backoff. Any terminal outcome is
//! reported through the returned [`ConsumerHandle`].
//!
//! Every operation takes a [`CancellationToken`]; cancelling it aborts the
//! call in flight with [`RedisError::Cancelled`].
//!
//! ```no_run
//! use rose_redis::queue::{handler_fn, ConsumerOptions, HandlerError, MessageInfo, StreamQueue};
//! use rose_redis::{fields, Client, ConnectionConfig, Fields};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect(ConnectionConfig::new("redis://localhost:6379")).await?;
//! let queue = StreamQueue::new(client);
//! let ctx = CancellationToken::new();
//!
//! let handle = queue
//!     .consume(
//!         &ctx,
//!         ConsumerOptions::new("orders", "billing", "worker-1").with_batch_size(10),
//!         handler_fn(|info: MessageInfo, fields: Fields| async move {
//!             println!("{} -> {:?}", info.id, fields);
//!             Ok::<(), HandlerError>(())
//!         }),
//!     )
//!     .await?;
//!
//! queue.publish(&ctx, "orders", &fields([("sku", "A-1")])).await?;
//!
//! let stats = handle.stop().await?;
//! println!("acknowledged {}", stats.acknowledged);
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::core::{
    config::{ConnectionConfig, ReconnectConfig},
    error::{RedisError, RedisResult},
    value::Fields,
};
use crate::streams::{ReadOptions, StreamMessage};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Error type handlers report failures with
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Where a new consumer group starts reading
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Deliver the whole stream history (`0`)
    #[default]
    Beginning,
    /// Deliver only entries added after the group is created (`$`)
    Latest,
    /// Deliver entries after the given ID
    Id(String),
}

impl StartPosition {
    /// ID argument for `XGROUP CREATE`
    #[must_use]
    pub fn as_id(&self) -> &str {
        match self {
            Self::Beginning => "0",
            Self::Latest => "$",
            Self::Id(id) => id,
        }
    }
}

/// What to do with a message whose handler failed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Leave the message pending and terminate the consumer
    Stop,
    /// Leave the message pending and move on
    #[default]
    Skip,
    /// Call the handler up to `attempts` times in total, then leave the
    /// message pending and move on
    Retry {
        /// Total handler invocations, at least 1
        attempts: usize,
        /// Pause between invocations
        backoff: Duration,
    },
    /// Like `Retry`, then copy the message to `topic` and acknowledge it
    DeadLetter {
        /// Dead-letter stream
        topic: String,
        /// Total handler invocations, at least 1
        attempts: usize,
        /// Pause between invocations
        backoff: Duration,
    },
}

impl FailurePolicy {
    fn attempts(&self) -> usize {
        match self {
            Self::Stop | Self::Skip => 1,
            Self::Retry { attempts, .. } | Self::DeadLetter { attempts, .. } => *attempts,
        }
    }

    fn backoff(&self) -> Duration {
        match self {
            Self::Stop | Self::Skip => Duration::ZERO,
            Self::Retry { backoff, .. } | Self::DeadLetter { backoff, .. } => *backoff,
        }
    }
}

/// Identity of a delivered message, passed to handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Stream the message was read from
    pub topic: String,
    /// Consumer group
    pub group: String,
    /// Consumer name
    pub consumer: String,
    /// Message ID
    pub id: String,
}

/// Processes messages delivered to a consumer
///
/// Returning `Ok` acknowledges the message. Implement this for your own
/// types, or wrap an async closure with [`handler_fn`].
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message
    async fn handle(&self, info: &MessageInfo, fields: &Fields) -> Result<(), HandlerError>;
}

/// Handler built from an async closure, see [`handler_fn`]
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`MessageHandler`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(MessageInfo, Fields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(MessageInfo, Fields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, info: &MessageInfo, fields: &Fields) -> Result<(), HandlerError> {
        (self.f)(info.clone(), fields.clone()).await
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Stream operations the queue needs
///
/// Implemented by [`Client`]; tests drive the queue with an in-memory
/// implementation.
#[async_trait]
pub trait StreamBackend: Clone + Send + Sync + 'static {
    /// `XGROUP CREATE topic group start MKSTREAM`
    async fn create_group(&self, topic: &str, group: &str, start: &str) -> RedisResult<()>;

    /// `XREADGROUP`; `block` waits indefinitely for new entries
    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        id: &str,
        count: usize,
        block: bool,
    ) -> RedisResult<Vec<StreamMessage>>;

    /// `XACK` of a single ID
    async fn ack(&self, topic: &str, group: &str, id: &str) -> RedisResult<()>;

    /// `XADD topic *`, returning the new ID
    async fn add(&self, topic: &str, fields: &Fields) -> RedisResult<String>;

    /// `XLEN`
    async fn len(&self, topic: &str) -> RedisResult<u64>;

    /// `XTRIM topic MAXLEN ~ max_len`, returning the number of evicted entries
    async fn trim(&self, topic: &str, max_len: u64) -> RedisResult<u64>;

    /// Number of pending entries in the group
    async fn pending(&self, topic: &str, group: &str) -> RedisResult<u64>;

    /// A backend on a connection of its own, for blocking reads
    async fn reader(&self) -> RedisResult<Self>;

    /// Reconnect policy consumers inherit through [`StreamQueue::options`]
    fn reconnect_policy(&self) -> Option<ReconnectConfig> {
        None
    }
}

#[async_trait]
impl StreamBackend for Client {
    async fn create_group(&self, topic: &str, group: &str, start: &str) -> RedisResult<()> {
        self.xgroup_create_mkstream(topic, group, start).await
    }

    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        id: &str,
        count: usize,
        block: bool,
    ) -> RedisResult<Vec<StreamMessage>> {
        let options = if block {
            ReadOptions::blocking(count, Duration::ZERO)
        } else {
            ReadOptions::non_blocking(count)
        };
        self.xreadgroup(group, consumer, topic, id, &options).await
    }

    async fn ack(&self, topic: &str, group: &str, id: &str) -> RedisResult<()> {
        self.xack(topic, group, &[id]).await.map(|_| ())
    }

    async fn add(&self, topic: &str, fields: &Fields) -> RedisResult<String> {
        self.xadd(topic, "*", fields).await
    }

    async fn len(&self, topic: &str) -> RedisResult<u64> {
        self.xlen(topic).await
    }

    async fn trim(&self, topic: &str, max_len: u64) -> RedisResult<u64> {
        self.xtrim_maxlen_approx(topic, max_len).await
    }

    async fn pending(&self, topic: &str, group: &str) -> RedisResult<u64> {
        Ok(self.xpending(topic, group).await?.count)
    }

    async fn reader(&self) -> RedisResult<Self> {
        self.dedicated().await
    }

    fn reconnect_policy(&self) -> Option<ReconnectConfig> {
        Some(self.config().reconnect.clone())
    }
}

/// Settings of one consumer registration
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerOptions {
    /// Stream to consume
    pub topic: String,
    /// Consumer group
    pub group: String,
    /// Consumer name, unique within the group
    pub consumer: String,
    /// Maximum entries per read
    pub batch_size: usize,
    /// Where the group starts if it has to be created
    pub start: StartPosition,
    /// Handling of handler failures
    pub failure_policy: FailurePolicy,
    /// Reconnection after read failures
    pub reconnect: ReconnectConfig,
    /// Re-process this consumer's pending entries before reading new ones
    pub recover_pending: bool,
}

impl ConsumerOptions {
    /// Options with a batch size of 10, reading from the beginning,
    /// skipping failed messages and reconnecting up to 5 times
    pub fn new(topic: impl Into<String>, group: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            consumer: consumer.into(),
            batch_size: 10,
            start: StartPosition::Beginning,
            failure_policy: FailurePolicy::Skip,
            reconnect: ReconnectConfig::default().with_max_attempts(5),
            recover_pending: false,
        }
    }

    /// Like [`ConsumerOptions::new`], reconnecting as `config.reconnect` says
    pub fn from_config(
        config: &ConnectionConfig,
        topic: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self::new(topic, group, consumer).with_reconnect(config.reconnect.clone())
    }

    /// Set the maximum entries per read
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the group start position
    #[must_use]
    pub fn with_start(mut self, start: StartPosition) -> Self {
        self.start = start;
        self
    }

    /// Set the failure policy
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the reconnect policy for read failures
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Re-process pending entries left by an earlier run of this consumer
    #[must_use]
    pub fn with_pending_recovery(mut self, enabled: bool) -> Self {
        self.recover_pending = enabled;
        self
    }

    /// Check the options before anything touches the server
    pub fn validate(&self) -> RedisResult<()> {
        if self.topic.is_empty() || self.group.is_empty() || self.consumer.is_empty() {
            return Err(RedisError::Config(
                "Topic, group and consumer names must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RedisError::Config("Batch size must be at least 1".to_string()));
        }
        match &self.failure_policy {
            FailurePolicy::Retry { attempts: 0, .. } | FailurePolicy::DeadLetter { attempts: 0, .. } => {
                Err(RedisError::Config("Retry attempts must be at least 1".to_string()))
            }
            FailurePolicy::DeadLetter { topic, .. } if topic.is_empty() || *topic == self.topic => Err(
                RedisError::Config("Dead-letter topic must differ from the consumed topic".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Counters of a consumer, as seen at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages handed to the handler at least once
    pub delivered: u64,
    /// Messages acknowledged after a successful handler run
    pub acknowledged: u64,
    /// Messages whose handler failed every attempt
    pub failed: u64,
    /// Failed messages copied to the dead-letter stream
    pub dead_lettered: u64,
    /// Non-empty batches read
    pub batches: u64,
    /// Successful reconnects after read failures
    pub reconnects: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    delivered: AtomicU64,
    acknowledged: AtomicU64,
    failed: AtomicU64,
    dead_lettered: AtomicU64,
    batches: AtomicU64,
    reconnects: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running consumer
///
/// Dropping the handle detaches the consumer; it then runs until its
/// context is cancelled or it hits a terminal error.
#[derive(Debug)]
pub struct ConsumerHandle {
    token: CancellationToken,
    task: JoinHandle<RedisResult<()>>,
    stats: Arc<StatsCounters>,
}

impl ConsumerHandle {
    /// Stop the consumer and wait for it to finish
    ///
    /// A read in progress is abandoned; messages already read are handled
    /// and acknowledged first.
    ///
    /// The server may still deliver an entry to an abandoned blocking read
    /// just before its connection closes. Such an entry stays pending for
    /// this consumer name, so consumers that restart under the same name
    /// should enable [`ConsumerOptions::with_pending_recovery`].
    pub async fn stop(self) -> RedisResult<ConsumerStats> {
        self.token.cancel();
        self.join().await
    }

    /// Wait for the consumer to finish on its own
    pub async fn join(self) -> RedisResult<ConsumerStats> {
        match self.task.await {
            Ok(Ok(())) => Ok(self.stats.snapshot()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(RedisError::Task(e.to_string())),
        }
    }

    /// Whether the consumer task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> ConsumerStats {
        self.stats.snapshot()
    }

    /// Token that stops this consumer when cancelled
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Run `fut` unless `ctx` is cancelled first
async fn with_cancel<T, F>(ctx: &CancellationToken, fut: F) -> RedisResult<T>
where
    F: Future<Output = RedisResult<T>>,
{
    tokio::select! {
        biased;
        () = ctx.cancelled() => Err(RedisError::Cancelled),
        result = fut => result,
    }
}

/// Consumer-group queue over a Redis stream
#[derive(Debug, Clone)]
pub struct StreamQueue<B = Client> {
    backend: B,
}

impl<B: StreamBackend> StreamQueue<B> {
    /// Create a queue on top of a backend, usually a [`Client`]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The backend this queue talks to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumer options using the backend's reconnect policy
    ///
    /// For a [`Client`] backend that is `ConnectionConfig::reconnect`.
    pub fn options(
        &self,
        topic: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> ConsumerOptions {
        let options = ConsumerOptions::new(topic, group, consumer);
        match self.backend.reconnect_policy() {
            Some(reconnect) => options.with_reconnect(reconnect),
            None => options,
        }
    }

    /// Create the consumer group (and the stream) if it does not exist yet
    ///
    /// An already existing group is success and keeps its position.
    pub async fn ensure_group(
        &self,
        ctx: &CancellationToken,
        topic: &str,
        group: &str,
        start: &StartPosition,
    ) -> RedisResult<()> {
        match with_cancel(ctx, self.backend.create_group(topic, group, start.as_id())).await {
            Ok(()) => {
                info!(topic, group, start = start.as_id(), "Created consumer group");
                Ok(())
            }
            Err(e) if e.is_busy_group() => {
                debug!(topic, group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Start a background consumer
    ///
    /// Validates the options and bootstraps the group before spawning, so
    /// configuration and bootstrap errors are returned here. Returns as soon
    /// as the consumer task is running.
    pub async fn consume<H: MessageHandler>(
        &self,
        ctx: &CancellationToken,
        options: ConsumerOptions,
        handler: H,
    ) -> RedisResult<ConsumerHandle> {
        options.validate()?;
        self.ensure_group(ctx, &options.topic, &options.group, &options.start)
            .await?;
        let reader = with_cancel(ctx, self.backend.reader()).await?;

        let stop = ctx.child_token();
        let stats = Arc::new(StatsCounters::default());
        let consumer = ConsumerLoop {
            backend: self.backend.clone(),
            reader,
            handler,
            options,
            parent: ctx.clone(),
            stop: stop.clone(),
            stats: Arc::clone(&stats),
        };
        let task = tokio::spawn(consumer.run());

        Ok(ConsumerHandle {
            token: stop,
            task,
            stats,
        })
    }

    /// Append a message, returning its ID
    pub async fn publish(&self, ctx: &CancellationToken, topic: &str, fields: &Fields) -> RedisResult<String> {
        if fields.is_empty() {
            return Err(RedisError::Config(format!(
                "Cannot publish an empty message to {topic}"
            )));
        }
        with_cancel(ctx, self.backend.add(topic, fields)).await
    }

    /// Cap the stream near `max` entries, returning how many were evicted
    pub async fn set_max_count(&self, ctx: &CancellationToken, topic: &str, max: u64) -> RedisResult<u64> {
        with_cancel(ctx, self.backend.trim(topic, max)).await
    }

    /// Number of entries in the stream
    pub async fn count(&self, ctx: &CancellationToken, topic: &str) -> RedisResult<u64> {
        with_cancel(ctx, self.backend.len(topic)).await
    }

    /// Number of delivered but unacknowledged entries in a group
    pub async fn pending_count(&self, ctx: &CancellationToken, topic: &str, group: &str) -> RedisResult<u64> {
        with_cancel(ctx, self.backend.pending(topic, group)).await
    }
}

struct ConsumerLoop<B, H> {
    backend: B,
    reader: B,
    handler: H,
    options: ConsumerOptions,
    parent: CancellationToken,
    stop: CancellationToken,
    stats: Arc<StatsCounters>,
}

impl<B: StreamBackend, H: MessageHandler> ConsumerLoop<B, H> {
    async fn run(mut self) -> RedisResult<()> {
        let (topic, group, consumer) = (
            self.options.topic.clone(),
            self.options.group.clone(),
            self.options.consumer.clone(),
        );
        info!(%topic, %group, %consumer, batch_size = self.options.batch_size, "Consumer started");

        let result = self.run_inner().await;
        match &result {
            Ok(()) => info!(%topic, %group, %consumer, "Consumer stopped"),
            Err(e) => error!(%topic, %group, %consumer, error = %e, "Consumer terminated"),
        }
        result
    }

    async fn run_inner(&mut self) -> RedisResult<()> {
        if self.options.recover_pending && !self.recover_pending().await? {
            return Ok(());
        }

        while !self.stop.is_cancelled() {
            let Some(batch) = self.read_next().await? else {
                break;
            };
            if batch.is_empty() {
                continue;
            }
            StatsCounters::bump(&self.stats.batches);
            debug!(topic = %self.options.topic, size = batch.len(), "Read batch");

            for message in batch {
                self.process(message).await?;
            }
        }
        Ok(())
    }

    /// Re-read this consumer's pending entries once, oldest first
    ///
    /// Returns `false` when stopped along the way.
    async fn recover_pending(&mut self) -> RedisResult<bool> {
        let mut cursor = "0".to_string();
        loop {
            let read = self.reader.read_group(
                &self.options.topic,
                &self.options.group,
                &self.options.consumer,
                &cursor,
                self.options.batch_size,
                false,
            );
            let batch = tokio::select! {
                biased;
                () = self.stop.cancelled() => return Ok(false),
                batch = read => batch?,
            };
            let Some(last) = batch.last() else {
                return Ok(true);
            };
            cursor = last.id.clone();
            info!(topic = %self.options.topic, count = batch.len(), "Recovering pending messages");

            for message in batch {
                if message.fields.is_empty() {
                    // Deleted from the stream while pending
                    self.ack(&message.id).await?;
                    continue;
                }
                self.process(message).await?;
            }
        }
    }

    /// Read the next batch, reconnecting on failure
    ///
    /// Returns `None` when stopped while waiting.
    async fn read_next(&mut self) -> RedisResult<Option<Vec<StreamMessage>>> {
        let mut failures = 0;
        loop {
            let read = self.reader.read_group(
                &self.options.topic,
                &self.options.group,
                &self.options.consumer,
                ">",
                self.options.batch_size,
                true,
            );
            let err = tokio::select! {
                biased;
                () = self.stop.cancelled() => return Ok(None),
                result = read => match result {
                    Ok(batch) => return Ok(Some(batch)),
                    Err(e) => e,
                },
            };

            failures += 1;
            let reconnect = &self.options.reconnect;
            if !reconnect.allows(failures) {
                return Err(if reconnect.enabled {
                    RedisError::MaxRetriesExceeded(failures - 1)
                } else {
                    err
                });
            }

            let delay = reconnect.delay_for_attempt(failures);
            warn!(
                topic = %self.options.topic,
                attempt = failures,
                ?delay,
                error = %err,
                "Read failed, reconnecting"
            );
            tokio::select! {
                biased;
                () = self.stop.cancelled() => return Ok(None),
                () = tokio::time::sleep(delay) => {}
            }

            match self.backend.reader().await {
                Ok(reader) => {
                    self.reader = reader;
                    StatsCounters::bump(&self.stats.reconnects);
                    info!(topic = %self.options.topic, attempt = failures, "Reconnected");
                }
                Err(e) => warn!(topic = %self.options.topic, error = %e, "Reconnect failed"),
            }
        }
    }

    async fn process(&self, message: StreamMessage) -> RedisResult<()> {
        let info = MessageInfo {
            topic: self.options.topic.clone(),
            group: self.options.group.clone(),
            consumer: self.options.consumer.clone(),
            id: message.id.clone(),
        };
        StatsCounters::bump(&self.stats.delivered);

        let policy = &self.options.failure_policy;
        let attempts = policy.attempts();
        let mut reason = String::new();
        for attempt in 1..=attempts {
            let outcome = tokio::select! {
                biased;
                () = self.parent.cancelled() => return Err(RedisError::Cancelled),
                outcome = self.handler.handle(&info, &message.fields) => outcome,
            };
            match outcome {
                Ok(()) => {
                    self.ack(&message.id).await?;
                    StatsCounters::bump(&self.stats.acknowledged);
                    return Ok(());
                }
                Err(e) => {
                    reason = e.to_string();
                    warn!(topic = %info.topic, id = %info.id, attempt, error = %reason, "Handler failed");
                }
            }
            if attempt < attempts {
                tokio::select! {
                    biased;
                    () = self.parent.cancelled() => return Err(RedisError::Cancelled),
                    () = tokio::time::sleep(policy.backoff()) => {}
                }
            }
        }

        StatsCounters::bump(&self.stats.failed);
        match policy {
            FailurePolicy::Stop => Err(RedisError::Handler {
                id: message.id,
                reason,
            }),
            FailurePolicy::Skip | FailurePolicy::Retry { .. } => {
                debug!(topic = %info.topic, id = %info.id, "Leaving message pending");
                Ok(())
            }
            FailurePolicy::DeadLetter { topic, .. } => {
                let moved = with_cancel(&self.parent, self.backend.add(topic, &message.fields)).await?;
                self.ack(&message.id).await?;
                StatsCounters::bump(&self.stats.dead_lettered);
                warn!(topic = %info.topic, id = %info.id, dead_letter = %topic, new_id = %moved, "Message dead-lettered");
                Ok(())
            }
        }
    }

    async fn ack(&self, id: &str) -> RedisResult<()> {
        with_cancel(
            &self.parent,
            self.backend.ack(&self.options.topic, &self.options.group, id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{fields, FieldValue};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct GroupState {
        /// Entries delivered so far by `>` reads
        cursor: usize,
        /// Pending IDs with their owning consumer, in delivery order
        pending: Vec<(u64, String)>,
    }

    #[derive(Default)]
    struct MemoryState {
        streams: HashMap<String, Vec<(u64, Fields)>>,
        groups: HashMap<(String, String), GroupState>,
        next_id: u64,
        fail_create: bool,
        fail_reads: usize,
        fail_acks: bool,
        readers_opened: usize,
        largest_batch: usize,
        reconnect: Option<ReconnectConfig>,
    }

    /// In-memory stream store with consumer-group semantics
    #[derive(Clone, Default)]
    struct MemoryBackend {
        state: Arc<Mutex<MemoryState>>,
        appended: Arc<Notify>,
    }

    fn parse_id(id: &str) -> u64 {
        id.split('-').next().and_then(|n| n.parse().ok()).unwrap_or(0)
    }

    impl MemoryBackend {
        fn with<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
            f(&mut self.state.lock().unwrap())
        }
    }

    #[async_trait]
    impl StreamBackend for MemoryBackend {
        async fn create_group(&self, topic: &str, group: &str, start: &str) -> RedisResult<()> {
            self.with(|s| {
                if s.fail_create {
                    return Err(RedisError::Server("ERR permission denied".to_string()));
                }
                let len = s.streams.entry(topic.to_string()).or_default().len();
                let key = (topic.to_string(), group.to_string());
                if s.groups.contains_key(&key) {
                    return Err(RedisError::Server(
                        "BUSYGROUP Consumer Group name already exists".to_string(),
                    ));
                }
                let cursor = match start {
                    "0" => 0,
                    "$" => len,
                    id => {
                        let after = parse_id(id);
                        s.streams[topic].iter().filter(|(n, _)| *n <= after).count()
                    }
                };
                s.groups.insert(key, GroupState { cursor, pending: Vec::new() });
                Ok(())
            })
        }

        async fn read_group(
            &self,
            topic: &str,
            group: &str,
            consumer: &str,
            id: &str,
            count: usize,
            block: bool,
        ) -> RedisResult<Vec<StreamMessage>> {
            loop {
                let appended = self.appended.notified();
                let batch = self.with(|s| -> RedisResult<Vec<StreamMessage>> {
                    if s.fail_reads > 0 {
                        s.fail_reads -= 1;
                        return Err(RedisError::Connection("connection reset".to_string()));
                    }
                    let entries = s.streams.get(topic).cloned().unwrap_or_default();
                    let state = s
                        .groups
                        .get_mut(&(topic.to_string(), group.to_string()))
                        .ok_or_else(|| RedisError::Server("NOGROUP No such consumer group".to_string()))?;

                    let batch: Vec<StreamMessage> = if id == ">" {
                        let fresh: Vec<_> = entries.iter().skip(state.cursor).take(count).cloned().collect();
                        state.cursor += fresh.len();
                        for (n, _) in &fresh {
                            state.pending.push((*n, consumer.to_string()));
                        }
                        fresh
                            .into_iter()
                            .map(|(n, f)| StreamMessage::new(format!("{n}-0"), f))
                            .collect()
                    } else {
                        let after = parse_id(id);
                        state
                            .pending
                            .iter()
                            .filter(|(n, owner)| owner == consumer && *n > after)
                            .take(count)
                            .map(|(n, _)| {
                                let fields = entries
                                    .iter()
                                    .find(|(m, _)| m == n)
                                    .map(|(_, f)| f.clone())
                                    .unwrap_or_default();
                                StreamMessage::new(format!("{n}-0"), fields)
                            })
                            .collect()
                    };
                    s.largest_batch = s.largest_batch.max(batch.len());
                    Ok(batch)
                })?;

                if !batch.is_empty() || !block || id != ">" {
                    return Ok(batch);
                }
                appended.await;
            }
        }

        async fn ack(&self, topic: &str, group: &str, id: &str) -> RedisResult<()> {
            self.with(|s| {
                if s.fail_acks {
                    return Err(RedisError::Connection("broken pipe".to_string()));
                }
                if let Some(state) = s.groups.get_mut(&(topic.to_string(), group.to_string())) {
                    let n = parse_id(id);
                    state.pending.retain(|(m, _)| *m != n);
                }
                Ok(())
            })
        }

        async fn add(&self, topic: &str, fields: &Fields) -> RedisResult<String> {
            let id = self.with(|s| {
                s.next_id += 1;
                let n = s.next_id;
                s.streams.entry(topic.to_string()).or_default().push((n, fields.clone()));
                format!("{n}-0")
            });
            self.appended.notify_waiters();
            Ok(id)
        }

        async fn len(&self, topic: &str) -> RedisResult<u64> {
            Ok(self.with(|s| s.streams.get(topic).map_or(0, Vec::len)) as u64)
        }

        async fn trim(&self, topic: &str, max_len: u64) -> RedisResult<u64> {
            Ok(self.with(|s| {
                let stream = s.streams.entry(topic.to_string()).or_default();
                let excess = stream.len().saturating_sub(max_len as usize);
                stream.drain(..excess);
                excess as u64
            }))
        }

        async fn pending(&self, topic: &str, group: &str) -> RedisResult<u64> {
            Ok(self.with(|s| {
                s.groups
                    .get(&(topic.to_string(), group.to_string()))
                    .map_or(0, |g| g.pending.len()) as u64
            }))
        }

        async fn reader(&self) -> RedisResult<Self> {
            self.with(|s| s.readers_opened += 1);
            Ok(self.clone())
        }

        fn reconnect_policy(&self) -> Option<ReconnectConfig> {
            self.with(|s| s.reconnect.clone())
        }
    }

    fn message(n: i64) -> Fields {
        fields([("n", FieldValue::Int(n))])
    }

    /// Handler recording message IDs, failing for IDs in `fail_ids`
    fn recording_handler(seen: Arc<Mutex<Vec<String>>>, fail_ids: Vec<String>) -> impl MessageHandler {
        handler_fn(move |info: MessageInfo, _fields: Fields| {
            let seen = Arc::clone(&seen);
            let fail = fail_ids.contains(&info.id);
            async move {
                seen.lock().unwrap().push(info.id.clone());
                if fail {
                    Err(HandlerError::from(format!("cannot process {}", info.id)))
                } else {
                    Ok(())
                }
            }
        })
    }

    async fn wait_until(handle: &ConsumerHandle, done: impl Fn(&ConsumerStats) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(&handle.stats()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("consumer did not make progress");
    }

    async fn publish_n(queue: &StreamQueue<MemoryBackend>, ctx: &CancellationToken, topic: &str, n: i64) -> Vec<String> {
        let mut ids = Vec::new();
        for i in 0..n {
            ids.push(queue.publish(ctx, topic, &message(i)).await.unwrap());
        }
        ids
    }

    fn fast_reconnect(max_attempts: usize) -> ReconnectConfig {
        ReconnectConfig::default()
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
            .with_max_attempts(max_attempts)
    }

    #[test]
    fn test_start_position_ids() {
        assert_eq!(StartPosition::Beginning.as_id(), "0");
        assert_eq!(StartPosition::Latest.as_id(), "$");
        assert_eq!(StartPosition::Id("5-0".to_string()).as_id(), "5-0");
    }

    #[test]
    fn test_options_validation() {
        assert!(ConsumerOptions::new("t", "g", "c").validate().is_ok());
        assert!(ConsumerOptions::new("t", "g", "c").with_batch_size(0).validate().is_err());
        assert!(ConsumerOptions::new("", "g", "c").validate().is_err());
        assert!(ConsumerOptions::new("t", "g", "c")
            .with_failure_policy(FailurePolicy::Retry { attempts: 0, backoff: Duration::ZERO })
            .validate()
            .is_err());
        assert!(ConsumerOptions::new("t", "g", "c")
            .with_failure_policy(FailurePolicy::DeadLetter {
                topic: "t".to_string(),
                attempts: 1,
                backoff: Duration::ZERO,
            })
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_ensure_group_is_idempotent() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();

        queue.ensure_group(&ctx, "orders", "billing", &StartPosition::Beginning).await.unwrap();
        queue.ensure_group(&ctx, "orders", "billing", &StartPosition::Latest).await.unwrap();
        assert_eq!(queue.count(&ctx, "orders").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_group_propagates_other_errors() {
        let backend = MemoryBackend::default();
        backend.with(|s| s.fail_create = true);
        let queue = StreamQueue::new(backend);
        let ctx = CancellationToken::new();

        let err = queue
            .consume(&ctx, ConsumerOptions::new("orders", "billing", "c1"), recording_handler(Default::default(), vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ERR"));
        assert_eq!(queue.backend().with(|s| s.readers_opened), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_aborts_calls() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = queue.ensure_group(&ctx, "orders", "billing", &StartPosition::Beginning).await.unwrap_err();
        assert!(matches!(err, RedisError::Cancelled));
        assert!(matches!(queue.count(&ctx, "orders").await, Err(RedisError::Cancelled)));
    }

    #[tokio::test]
    async fn test_consume_acknowledges_in_order() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        let ids = publish_n(&queue, &ctx, "orders", 5).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = queue
            .consume(&ctx, ConsumerOptions::new("orders", "billing", "c1"), recording_handler(seen.clone(), vec![]))
            .await
            .unwrap();

        wait_until(&handle, |s| s.acknowledged == 5).await;
        assert_eq!(*seen.lock().unwrap(), ids);
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 0);

        let stats = handle.stop().await.unwrap();
        assert_eq!(stats.delivered, 5);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_slow_handler_drains_topic_one_by_one() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        for title in 0..10 {
            queue
                .publish(&ctx, "test", &fields([("title", FieldValue::Int(title))]))
                .await
                .unwrap();
        }

        let handler = handler_fn(|_info: MessageInfo, _fields: Fields| async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok::<(), HandlerError>(())
        });
        let handle = tokio::time::timeout(
            Duration::from_millis(500),
            queue.consume(&ctx, ConsumerOptions::new("test", "g", "c").with_batch_size(1), handler),
        )
        .await
        .expect("registration must not wait for processing")
        .unwrap();

        wait_until(&handle, |s| s.acknowledged == 10).await;
        assert_eq!(queue.pending_count(&ctx, "test", "g").await.unwrap(), 0);
        let stats = handle.stop().await.unwrap();
        assert_eq!(stats.batches, 10);
        assert_eq!(queue.backend().with(|s| s.largest_batch), 1);
    }

    #[tokio::test]
    async fn test_batches_are_bounded_by_batch_size() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        publish_n(&queue, &ctx, "orders", 7).await;

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_batch_size(3),
                recording_handler(Default::default(), vec![]),
            )
            .await
            .unwrap();

        wait_until(&handle, |s| s.acknowledged == 7).await;
        let stats = handle.stop().await.unwrap();
        assert_eq!(stats.batches, 3);
        assert_eq!(queue.backend().with(|s| s.largest_batch), 3);
    }

    #[tokio::test]
    async fn test_messages_published_while_blocked_are_delivered() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_start(StartPosition::Latest),
                recording_handler(seen.clone(), vec![]),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let id = queue.publish(&ctx, "orders", &message(1)).await.unwrap();

        wait_until(&handle, |s| s.acknowledged == 1).await;
        assert_eq!(*seen.lock().unwrap(), vec![id]);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_skip_policy_leaves_failures_pending() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        let ids = publish_n(&queue, &ctx, "orders", 3).await;

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1"),
                recording_handler(Default::default(), vec![ids[1].clone()]),
            )
            .await
            .unwrap();

        wait_until(&handle, |s| s.delivered == 3 && s.acknowledged == 2).await;
        assert!(!handle.is_finished());
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 1);

        let stats = handle.stop().await.unwrap();
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_stop_policy_terminates_with_handler_error() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        let ids = publish_n(&queue, &ctx, "orders", 3).await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_failure_policy(FailurePolicy::Stop),
                recording_handler(seen.clone(), vec![ids[1].clone()]),
            )
            .await
            .unwrap();

        match handle.join().await {
            Err(RedisError::Handler { id, reason }) => {
                assert_eq!(id, ids[1]);
                assert!(reason.contains("cannot process"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The third message was never handed out
        assert_eq!(*seen.lock().unwrap(), ids[..2].to_vec());
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retry_policy_reinvokes_handler() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        publish_n(&queue, &ctx, "orders", 1).await;

        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let handler = handler_fn(move |_info: MessageInfo, _fields: Fields| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(HandlerError::from("flaky"))
                } else {
                    Ok(())
                }
            }
        });

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_failure_policy(FailurePolicy::Retry {
                    attempts: 3,
                    backoff: Duration::from_millis(1),
                }),
                handler,
            )
            .await
            .unwrap();

        wait_until(&handle, |s| s.acknowledged == 1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let stats = handle.stop().await.unwrap();
        assert_eq!((stats.delivered, stats.failed), (1, 0));
    }

    #[tokio::test]
    async fn test_dead_letter_policy_moves_and_acknowledges() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        let ids = publish_n(&queue, &ctx, "orders", 2).await;

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_failure_policy(FailurePolicy::DeadLetter {
                    topic: "orders:dead".to_string(),
                    attempts: 2,
                    backoff: Duration::from_millis(1),
                }),
                recording_handler(Default::default(), vec![ids[0].clone()]),
            )
            .await
            .unwrap();

        wait_until(&handle, |s| s.dead_lettered == 1 && s.acknowledged == 1).await;
        assert_eq!(queue.count(&ctx, "orders:dead").await.unwrap(), 1);
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 0);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_clean() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();

        let handle = queue
            .consume(&ctx, ConsumerOptions::new("orders", "billing", "c1"), recording_handler(Default::default(), vec![]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stats = tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop did not interrupt the blocked read")
            .unwrap();
        assert_eq!(stats, ConsumerStats::default());
    }

    #[tokio::test]
    async fn test_parent_cancel_during_handler_is_an_error() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        publish_n(&queue, &ctx, "orders", 1).await;

        let started = Arc::new(Notify::new());
        let signal = Arc::clone(&started);
        let handler = handler_fn(move |_info: MessageInfo, _fields: Fields| {
            let signal = Arc::clone(&signal);
            async move {
                signal.notify_one();
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        });

        let handle = queue
            .consume(&ctx, ConsumerOptions::new("orders", "billing", "c1"), handler)
            .await
            .unwrap();
        started.notified().await;
        ctx.cancel();

        assert!(matches!(handle.join().await, Err(RedisError::Cancelled)));
        assert_eq!(queue.backend().pending("orders", "billing").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_failures_reconnect() {
        let backend = MemoryBackend::default();
        backend.with(|s| s.fail_reads = 2);
        let queue = StreamQueue::new(backend);
        let ctx = CancellationToken::new();
        publish_n(&queue, &ctx, "orders", 2).await;

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_reconnect(fast_reconnect(3)),
                recording_handler(Default::default(), vec![]),
            )
            .await
            .unwrap();

        wait_until(&handle, |s| s.acknowledged == 2).await;
        let stats = handle.stop().await.unwrap();
        assert_eq!(stats.reconnects, 2);
        // One reader at startup plus one per reconnect
        assert_eq!(queue.backend().with(|s| s.readers_opened), 3);
    }

    #[tokio::test]
    async fn test_reconnect_gives_up_after_max_attempts() {
        let backend = MemoryBackend::default();
        backend.with(|s| s.fail_reads = usize::MAX);
        let queue = StreamQueue::new(backend);
        let ctx = CancellationToken::new();

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_reconnect(fast_reconnect(2)),
                recording_handler(Default::default(), vec![]),
            )
            .await
            .unwrap();

        assert!(matches!(handle.join().await, Err(RedisError::MaxRetriesExceeded(2))));
    }

    #[tokio::test]
    async fn test_read_failure_without_reconnect_is_terminal() {
        let backend = MemoryBackend::default();
        backend.with(|s| s.fail_reads = 1);
        let queue = StreamQueue::new(backend);
        let ctx = CancellationToken::new();

        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_reconnect(ReconnectConfig::disabled()),
                recording_handler(Default::default(), vec![]),
            )
            .await
            .unwrap();

        let err = handle.join().await.unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_options_inherit_backend_reconnect_policy() {
        let queue = StreamQueue::new(MemoryBackend::default());
        assert_eq!(
            queue.options("orders", "billing", "c1"),
            ConsumerOptions::new("orders", "billing", "c1")
        );

        queue.backend().with(|s| {
            s.reconnect = Some(ReconnectConfig::disabled());
            s.fail_reads = 1;
        });
        let options = queue.options("orders", "billing", "c1");
        assert!(!options.reconnect.enabled);

        let ctx = CancellationToken::new();
        let handle = queue
            .consume(&ctx, options, recording_handler(Default::default(), vec![]))
            .await
            .unwrap();
        let err = handle.join().await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(queue.backend().with(|s| s.readers_opened), 1);
    }

    #[test]
    fn test_options_from_connection_config() {
        let config = ConnectionConfig::new("localhost").with_reconnect(ReconnectConfig::disabled());
        let options = ConsumerOptions::from_config(&config, "orders", "billing", "c1");
        assert_eq!(options.reconnect, ReconnectConfig::disabled());
        assert_eq!(options.batch_size, 10);

        let options = ConsumerOptions::from_config(&ConnectionConfig::default(), "orders", "billing", "c1");
        assert_eq!(options, ConsumerOptions::new("orders", "billing", "c1"));
    }

    #[tokio::test]
    async fn test_ack_failure_is_terminal() {
        let backend = MemoryBackend::default();
        backend.with(|s| s.fail_acks = true);
        let queue = StreamQueue::new(backend);
        let ctx = CancellationToken::new();
        publish_n(&queue, &ctx, "orders", 1).await;

        let handle = queue
            .consume(&ctx, ConsumerOptions::new("orders", "billing", "c1"), recording_handler(Default::default(), vec![]))
            .await
            .unwrap();

        assert!(matches!(handle.join().await, Err(RedisError::Connection(_))));
    }

    #[tokio::test]
    async fn test_pending_recovery_redelivers_own_messages() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        queue.ensure_group(&ctx, "orders", "billing", &StartPosition::Beginning).await.unwrap();
        let ids = publish_n(&queue, &ctx, "orders", 3).await;

        // An earlier run read everything and crashed before acknowledging
        let taken = queue.backend().read_group("orders", "billing", "c1", ">", 10, false).await.unwrap();
        assert_eq!(taken.len(), 3);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1")
                    .with_batch_size(2)
                    .with_pending_recovery(true),
                recording_handler(seen.clone(), vec![]),
            )
            .await
            .unwrap();

        wait_until(&handle, |s| s.acknowledged == 3).await;
        assert_eq!(*seen.lock().unwrap(), ids);
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 0);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_with_recovery_handles_entry_delivered_at_stop() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        let options = ConsumerOptions::new("orders", "billing", "c1").with_pending_recovery(true);

        let handle = queue
            .consume(&ctx, options.clone(), recording_handler(Default::default(), vec![]))
            .await
            .unwrap();
        handle.stop().await.unwrap();

        // Delivered to the abandoned read as its connection was closing
        let id = queue.publish(&ctx, "orders", &message(7)).await.unwrap();
        queue.backend().read_group("orders", "billing", "c1", ">", 10, false).await.unwrap();
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = queue
            .consume(&ctx, options, recording_handler(seen.clone(), vec![]))
            .await
            .unwrap();
        wait_until(&handle, |s| s.acknowledged == 1).await;
        assert_eq!(*seen.lock().unwrap(), vec![id]);
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 0);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_entries_ignored_without_recovery() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        queue.ensure_group(&ctx, "orders", "billing", &StartPosition::Beginning).await.unwrap();
        publish_n(&queue, &ctx, "orders", 2).await;
        queue.backend().read_group("orders", "billing", "c1", ">", 10, false).await.unwrap();

        let handle = queue
            .consume(&ctx, ConsumerOptions::new("orders", "billing", "c1"), recording_handler(Default::default(), vec![]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(handle.stats().delivered, 0);
        handle.stop().await.unwrap();
        assert_eq!(queue.pending_count(&ctx, "orders", "billing").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_consume_rejects_invalid_options() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();

        let err = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_batch_size(0),
                recording_handler(Default::default(), vec![]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RedisError::Config(_)));
        assert_eq!(queue.count(&ctx, "orders").await.unwrap(), 0);
        assert!(queue.backend().with(|s| s.groups.is_empty()));
    }

    #[tokio::test]
    async fn test_publish_count_and_trim() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();

        let err = queue.publish(&ctx, "orders", &Fields::new()).await.unwrap_err();
        assert!(matches!(err, RedisError::Config(_)));

        publish_n(&queue, &ctx, "orders", 5).await;
        assert_eq!(queue.count(&ctx, "orders").await.unwrap(), 5);
        assert_eq!(queue.set_max_count(&ctx, "orders", 2).await.unwrap(), 3);
        assert_eq!(queue.count(&ctx, "orders").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_two_consumers_share_a_group() {
        let queue = StreamQueue::new(MemoryBackend::default());
        let ctx = CancellationToken::new();
        publish_n(&queue, &ctx, "orders", 6).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c1").with_batch_size(1),
                recording_handler(seen.clone(), vec![]),
            )
            .await
            .unwrap();
        let second = queue
            .consume(
                &ctx,
                ConsumerOptions::new("orders", "billing", "c2").with_batch_size(1),
                recording_handler(seen.clone(), vec![]),
            )
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.lock().unwrap().len() < 6 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let a = first.stop().await.unwrap();
        let b = second.stop().await.unwrap();
        assert_eq!(a.acknowledged + b.acknowledged, 6);

        let mut ids = seen.lock().unwrap().clone();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }
}
