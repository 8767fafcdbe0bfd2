//! Stream queue with two consumers and a dead-letter topic
//!
//! Run with a local server: `cargo run --example queue_consumer`

use rose_redis::{
    fields, handler_fn, Client, ConnectionConfig, ConsumerOptions, FailurePolicy, Fields,
    HandlerError, MessageInfo, StreamQueue,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let client = Client::connect(ConnectionConfig::new(url)).await?;
    let queue = StreamQueue::new(client);
    let ctx = CancellationToken::new();

    let policy = FailurePolicy::DeadLetter {
        topic: "demo:orders:dead".to_string(),
        attempts: 3,
        backoff: Duration::from_millis(100),
    };

    let mut workers = Vec::new();
    for name in ["worker-1", "worker-2"] {
        let handler = handler_fn(|info: MessageInfo, fields: Fields| async move {
            match fields.get("sku").and_then(|v| v.as_str()) {
                Some(sku) if !sku.is_empty() => {
                    println!("[{}] {} -> {}", info.consumer, info.id, sku);
                    Ok(())
                }
                _ => Err(HandlerError::from("order without SKU")),
            }
        });
        let options = ConsumerOptions::new("demo:orders", "fulfilment", name)
            .with_batch_size(5)
            .with_failure_policy(policy.clone());
        workers.push(queue.consume(&ctx, options, handler).await?);
    }

    for sku in ["A-1", "B-2", "", "C-3"] {
        let id = queue.publish(&ctx, "demo:orders", &fields([("sku", sku)])).await?;
        println!("Published {}", id);
    }
    queue.set_max_count(&ctx, "demo:orders", 1000).await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    println!(
        "Pending: {}, dead letters: {}",
        queue.pending_count(&ctx, "demo:orders", "fulfilment").await?,
        queue.count(&ctx, "demo:orders:dead").await?
    );

    // Cancelling the shared context stops every worker
    ctx.cancel();
    for worker in workers {
        println!("{:?}", worker.join().await?);
    }
    Ok(())
}
