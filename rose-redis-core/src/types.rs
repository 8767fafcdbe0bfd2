//! Common types used throughout the library

use serde::{Deserialize, Serialize};

/// Sorted set member with an integer score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    /// Member name
    pub member: String,
    /// Score, truncated toward zero
    pub score: i64,
}

/// Sorted set member with a floating point score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatPair {
    /// Member name
    pub member: String,
    /// Score
    pub score: f64,
}

impl Pair {
    /// Create a new pair
    pub fn new(member: impl Into<String>, score: i64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

impl FloatPair {
    /// Create a new pair
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

impl From<FloatPair> for Pair {
    fn from(p: FloatPair) -> Self {
        Self {
            member: p.member,
            score: p.score as i64,
        }
    }
}

impl From<Pair> for FloatPair {
    fn from(p: Pair) -> Self {
        Self {
            member: p.member,
            score: p.score as f64,
        }
    }
}

/// Score interval for ZRANGEBYSCORE-style commands
///
/// Bounds use Redis syntax: `-inf`, `+inf`, `(5` for exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRange {
    /// Lower bound
    pub min: String,
    /// Upper bound
    pub max: String,
    /// Optional `(offset, count)` LIMIT
    pub limit: Option<(i64, i64)>,
}

impl ScoreRange {
    /// Create a new score range
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
            limit: None,
        }
    }

    /// Range covering every score
    pub fn all() -> Self {
        Self::new("-inf", "+inf")
    }

    /// Inclusive integer bounds
    pub fn between(min: i64, max: i64) -> Self {
        Self::new(min.to_string(), max.to_string())
    }

    /// Inclusive float bounds
    pub fn between_float(min: f64, max: f64) -> Self {
        Self::new(min.to_string(), max.to_string())
    }

    /// Limit to one page of `size` results, pages counted from zero
    pub fn page(mut self, page: i64, size: i64) -> Self {
        self.limit = Some((page * size, size));
        self
    }

    /// Limit with an explicit offset
    pub fn limit(mut self, offset: i64, count: i64) -> Self {
        self.limit = Some((offset, count));
        self
    }
}

/// Aggregation used by ZUNIONSTORE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    /// Sum the scores
    #[default]
    Sum,
    /// Keep the minimum score
    Min,
    /// Keep the maximum score
    Max,
}

impl Aggregate {
    /// Redis keyword
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Source keys and weights for ZUNIONSTORE
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZStore {
    /// Source sorted sets
    pub keys: Vec<String>,
    /// Per-key weights; empty means all 1
    pub weights: Vec<f64>,
    /// Score aggregation
    pub aggregate: Aggregate,
}

impl ZStore {
    /// Create from source keys
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set per-key weights
    #[must_use]
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    /// Set the aggregation
    #[must_use]
    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }
}

/// Distance unit for geo commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeoUnit {
    /// Meters
    #[default]
    Meters,
    /// Kilometers
    Kilometers,
    /// Miles
    Miles,
    /// Feet
    Feet,
}

impl GeoUnit {
    /// Redis keyword
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::Miles => "mi",
            Self::Feet => "ft",
        }
    }
}

/// Longitude/latitude coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    /// Longitude
    pub longitude: f64,
    /// Latitude
    pub latitude: f64,
}

/// A named point, optionally decorated by a radius query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Member name
    pub name: String,
    /// Longitude
    pub longitude: f64,
    /// Latitude
    pub latitude: f64,
    /// Distance from the query center (WITHDIST)
    pub dist: Option<f64>,
    /// Raw geohash (WITHHASH)
    pub geohash: Option<i64>,
}

impl GeoLocation {
    /// Create a location to add with GEOADD
    pub fn new(name: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            name: name.into(),
            longitude,
            latitude,
            ..Self::default()
        }
    }
}

/// Result ordering for radius queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Nearest first
    Asc,
    /// Farthest first
    Desc,
}

/// Options for GEORADIUS and GEORADIUSBYMEMBER
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRadiusQuery {
    /// Search radius
    pub radius: f64,
    /// Radius unit
    pub unit: GeoUnit,
    /// Include coordinates
    pub with_coord: bool,
    /// Include distance
    pub with_dist: bool,
    /// Include geohash
    pub with_geohash: bool,
    /// Maximum number of results
    pub count: Option<u64>,
    /// Result ordering
    pub sort: Option<SortOrder>,
}

impl GeoRadiusQuery {
    /// Create a query with the given radius
    #[must_use]
    pub fn new(radius: f64, unit: GeoUnit) -> Self {
        Self {
            radius,
            unit,
            with_coord: false,
            with_dist: false,
            with_geohash: false,
            count: None,
            sort: None,
        }
    }

    /// Include coordinates in results
    #[must_use]
    pub fn with_coord(mut self) -> Self {
        self.with_coord = true;
        self
    }

    /// Include distances in results
    #[must_use]
    pub fn with_dist(mut self) -> Self {
        self.with_dist = true;
        self
    }

    /// Include geohashes in results
    #[must_use]
    pub fn with_geohash(mut self) -> Self {
        self.with_geohash = true;
        self
    }

    /// Limit the number of results
    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Order results by distance
    #[must_use]
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }
}
