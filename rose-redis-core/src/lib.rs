//! Core types and traits for the rose-redis client
//!
//! This crate provides the configuration, error definitions and shared
//! reply types used throughout the rose-redis command facade and its
//! stream queue.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;
pub mod value;

pub use config::{ConnectionConfig, ReconnectConfig, TopologyMode};
pub use error::{RedisError, RedisResult};
pub use types::{
    Aggregate, FloatPair, GeoLocation, GeoPos, GeoRadiusQuery, GeoUnit, Pair, ScoreRange,
    SortOrder, ZStore,
};
pub use value::{FieldValue, Fields};
