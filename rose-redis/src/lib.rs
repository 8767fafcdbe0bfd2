//! Typed async Redis client with a stream consumer-group queue
//!
//! `rose-redis` wraps the `redis` driver behind a single [`Client`] that works
//! the same against a standalone server or a Redis Cluster. Every command
//! family (strings, keys, hashes, lists, sets, sorted sets, bitmaps,
//! HyperLogLog, geo, streams, scripting, pipelines) is a set of typed methods
//! on the client.
//!
//! On top of the stream commands, [`queue::StreamQueue`] runs consumer-group
//! workers: publish messages to a topic, register a handler, and every
//! message is delivered to exactly one consumer of the group and
//! acknowledged once the handler succeeds.
//!
//! # Features
//!
//! - Standalone and cluster topologies behind one API
//! - Per-command operation timeouts; blocking commands on dedicated connections
//! - Consumer groups with batch reads, failure policies and reconnect backoff
//! - Cancellation of queue operations through `CancellationToken`
//! - Lua scripts with `EVALSHA` caching
//!
//! # Quick Start
//!
//! ```no_run
//! use rose_redis::{Client, ConnectionConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::new("redis://localhost:6379");
//!     let client = Client::connect(config).await?;
//!
//!     client.set("mykey", "myvalue").await?;
//!     let value: Option<String> = client.get("mykey").await?;
//!     println!("Value: {:?}", value);
//!
//!     client.set_ex("session", "token", Duration::from_secs(60)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::future_not_send)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub use rose_redis_core as core;

pub mod cache;
pub mod client;
pub mod commands;
pub mod connection;
pub mod pipeline;
pub mod queue;
pub mod script;
pub mod streams;

pub use client::Client;
pub use connection::RedisConnection;
pub use pipeline::Pipeline;
pub use queue::{
    handler_fn, ConsumerHandle, ConsumerOptions, ConsumerStats, FailurePolicy, HandlerError,
    MessageHandler, MessageInfo, StartPosition, StreamBackend, StreamQueue,
};
pub use script::Script;
pub use streams::{
    PendingMessage, PendingSummary, ReadOptions, StreamInfo, StreamMessage, StreamRange,
};

pub use crate::core::{
    config::{ConnectionConfig, ReconnectConfig, TopologyMode},
    error::{RedisError, RedisResult},
    types,
    value::{fields, FieldValue, Fields},
};
