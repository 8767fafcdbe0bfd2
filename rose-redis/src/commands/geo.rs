//! Geospatial commands

use super::require_non_empty;
use crate::client::Client;
use crate::core::error::{RedisError, RedisResult};
use crate::core::types::{GeoLocation, GeoPos, GeoRadiusQuery, GeoUnit, SortOrder};
use redis::{Cmd, FromRedisValue, ToRedisArgs, Value};

/// Append radius, unit and the query's options to a GEORADIUS-family command
pub(crate) fn push_radius_args(cmd: &mut Cmd, query: &GeoRadiusQuery) {
    cmd.arg(query.radius.to_string()).arg(query.unit.as_str());
    if query.with_coord {
        cmd.arg("WITHCOORD");
    }
    if query.with_dist {
        cmd.arg("WITHDIST");
    }
    if query.with_geohash {
        cmd.arg("WITHHASH");
    }
    if let Some(count) = query.count {
        cmd.arg("COUNT").arg(count);
    }
    match query.sort {
        Some(SortOrder::Asc) => {
            cmd.arg("ASC");
        }
        Some(SortOrder::Desc) => {
            cmd.arg("DESC");
        }
        None => {}
    }
}

/// Decode a GEORADIUS reply
///
/// Plain queries answer with member names. With options, each entry is an
/// array of name, then distance, hash and coordinates in that order, each
/// present only when requested.
pub(crate) fn parse_radius_reply(reply: Value, query: &GeoRadiusQuery) -> RedisResult<Vec<GeoLocation>> {
    let items = match reply {
        Value::Array(items) => items,
        Value::Nil => return Ok(Vec::new()),
        other => {
            return Err(RedisError::UnexpectedResponse(format!(
                "GEORADIUS returned {other:?}"
            )))
        }
    };
    items
        .into_iter()
        .map(|item| parse_radius_item(item, query))
        .collect()
}

fn parse_radius_item(item: Value, query: &GeoRadiusQuery) -> RedisResult<GeoLocation> {
    if !(query.with_coord || query.with_dist || query.with_geohash) {
        let name = String::from_redis_value(&item)?;
        return Ok(GeoLocation {
            name,
            ..GeoLocation::default()
        });
    }

    let fields = match item {
        Value::Array(fields) => fields,
        other => {
            return Err(RedisError::UnexpectedResponse(format!(
                "GEORADIUS entry {other:?} is not an array"
            )))
        }
    };
    let mut fields = fields.into_iter();
    let mut location = GeoLocation {
        name: next_field(&mut fields)?,
        ..GeoLocation::default()
    };
    if query.with_dist {
        location.dist = Some(next_field(&mut fields)?);
    }
    if query.with_geohash {
        location.geohash = Some(next_field(&mut fields)?);
    }
    if query.with_coord {
        let (longitude, latitude): (f64, f64) = next_field(&mut fields)?;
        location.longitude = longitude;
        location.latitude = latitude;
    }
    Ok(location)
}

fn next_field<T: FromRedisValue>(fields: &mut impl Iterator<Item = Value>) -> RedisResult<T> {
    let value = fields
        .next()
        .ok_or_else(|| RedisError::UnexpectedResponse("GEORADIUS entry is too short".to_string()))?;
    Ok(T::from_redis_value(&value)?)
}

impl Client {
    /// Add locations, returning how many were new
    pub async fn geoadd<K: ToRedisArgs>(&self, key: K, locations: &[GeoLocation]) -> RedisResult<i64> {
        require_non_empty(locations, "GEOADD")?;
        let mut cmd = redis::cmd("GEOADD");
        cmd.arg(key);
        for location in locations {
            cmd.arg(location.longitude.to_string())
                .arg(location.latitude.to_string())
                .arg(&location.name);
        }
        self.execute(&cmd).await
    }

    /// Distance between two members, `None` when either is missing
    pub async fn geodist<K: ToRedisArgs>(
        &self,
        key: K,
        member1: &str,
        member2: &str,
        unit: GeoUnit,
    ) -> RedisResult<Option<f64>> {
        self.execute(
            redis::cmd("GEODIST")
                .arg(key)
                .arg(member1)
                .arg(member2)
                .arg(unit.as_str()),
        )
        .await
    }

    /// Geohash strings of members
    pub async fn geohash<K: ToRedisArgs, M: ToRedisArgs>(
        &self,
        key: K,
        members: &[M],
    ) -> RedisResult<Vec<Option<String>>> {
        require_non_empty(members, "GEOHASH")?;
        self.execute(redis::cmd("GEOHASH").arg(key).arg(members)).await
    }

    /// Coordinates of members; missing members map to `None`
    pub async fn geopos<K: ToRedisArgs, M: ToRedisArgs>(
        &self,
        key: K,
        members: &[M],
    ) -> RedisResult<Vec<Option<GeoPos>>> {
        require_non_empty(members, "GEOPOS")?;
        let raw: Vec<Option<(f64, f64)>> =
            self.execute(redis::cmd("GEOPOS").arg(key).arg(members)).await?;
        Ok(raw
            .into_iter()
            .map(|pos| {
                pos.map(|(longitude, latitude)| GeoPos {
                    longitude,
                    latitude,
                })
            })
            .collect())
    }

    /// Members within a radius of a point
    pub async fn georadius(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        query: &GeoRadiusQuery,
    ) -> RedisResult<Vec<GeoLocation>> {
        let mut cmd = redis::cmd("GEORADIUS");
        cmd.arg(key)
            .arg(longitude.to_string())
            .arg(latitude.to_string());
        push_radius_args(&mut cmd, query);
        let reply: Value = self.execute(&cmd).await?;
        parse_radius_reply(reply, query)
    }

    /// Members within a radius of another member
    pub async fn georadius_by_member(
        &self,
        key: &str,
        member: &str,
        query: &GeoRadiusQuery,
    ) -> RedisResult<Vec<GeoLocation>> {
        let mut cmd = redis::cmd("GEORADIUSBYMEMBER");
        cmd.arg(key).arg(member);
        push_radius_args(&mut cmd, query);
        let reply: Value = self.execute(&cmd).await?;
        parse_radius_reply(reply, query)
    }
}
