//! Basic usage of the command facade
//!
//! Run with a local server: `cargo run --example basic_usage`

use rose_redis::types::{GeoLocation, GeoRadiusQuery, GeoUnit, Pair};
use rose_redis::{Client, ConnectionConfig, RedisError, Script};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let client = Client::connect(ConnectionConfig::new(url)).await?;
    println!("Connected ({:?})", client.topology_mode());

    // Strings
    client.set("demo:greeting", "Hello, rose-redis!").await?;
    println!("GET demo:greeting = {:?}", client.get("demo:greeting").await?);
    println!("INCR demo:counter = {}", client.incr("demo:counter").await?);

    client
        .set_ex("demo:temp", "short lived", Duration::from_secs(5))
        .await?;
    println!("TTL demo:temp = {:?}", client.ttl("demo:temp").await?);

    // Distributed lock
    if client
        .set_nx_ex("demo:lock", "owner-1", Duration::from_secs(10))
        .await?
    {
        println!("Lock acquired");
        client.del(&["demo:lock"]).await?;
    }

    // Hashes and sorted sets
    client
        .hmset("demo:user", &[("name", "Ada"), ("lang", "rust")])
        .await?;
    println!("HGETALL demo:user = {:?}", client.hgetall("demo:user").await?);

    client
        .zadds("demo:scores", &[Pair::new("ada", 92), Pair::new("bob", 78)])
        .await?;
    for pair in client.zrevrange_with_scores("demo:scores", 0, -1).await? {
        println!("  {} -> {}", pair.member, pair.score);
    }

    // Geo
    client
        .geoadd(
            "demo:cities",
            &[
                GeoLocation::new("Palermo", 13.361389, 38.115556),
                GeoLocation::new("Catania", 15.087269, 37.502669),
            ],
        )
        .await?;
    let query = GeoRadiusQuery::new(200.0, GeoUnit::Kilometers).with_dist();
    for city in client.georadius("demo:cities", 15.0, 37.0, &query).await? {
        println!("  {} is {:?} km away", city.name, city.dist);
    }

    // Cache-aside with a randomised expiry
    let profile = client
        .get_with_cache(
            "demo:profile",
            Duration::from_secs(30),
            Duration::from_secs(60),
            || async { Ok::<_, RedisError>("expensive result".to_string()) },
        )
        .await?;
    println!("Cached profile = {}", profile);

    // Scripts and pipelines
    let script = Script::new("return redis.call('INCRBY', KEYS[1], ARGV[1])");
    let total: i64 = script.execute(&client, &["demo:counter"], &["10"]).await?;
    println!("Script result = {}", total);

    let replies = client
        .pipelined(|p| {
            p.incr("demo:counter").get("demo:greeting");
        })
        .await?;
    println!("Pipeline replies = {:?}", replies);

    client
        .del(&[
            "demo:greeting",
            "demo:counter",
            "demo:temp",
            "demo:user",
            "demo:scores",
            "demo:cities",
            "demo:profile",
        ])
        .await?;
    Ok(())
}
