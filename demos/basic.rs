//! Basic example wiring the three gates into one bot handler.
//!
//! A user double-taps "confirm deal" and a client retries the same tap. Only
//! the first delivery runs the handler; it paces its provider calls through
//! the limiter and counts the confirming user once per deal.

use escrow_gate::{
    ActionDeduplicator, ActionDispatcher, DedupConfig, Dispatched, InMemoryRecordStore,
    InboundAction, TokenBucketLimiter, UniqueActionGuard,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Repeats of a tap within 3 seconds are suppressed
    let dedup = Arc::new(ActionDeduplicator::new(DedupConfig::new(
        Duration::from_secs(3),
        10_000,
    )?)?);
    let sweeper = dedup.spawn_sweeper();
    let dispatcher = ActionDispatcher::new(Arc::clone(&dedup));

    // Provider allows bursts of 2 and 2 calls per second after that
    let limiter = TokenBucketLimiter::new(2.0, 2.0)?;
    let confirmations = UniqueActionGuard::new(InMemoryRecordStore::new());

    println!("=== Basic Escrow Gate Example ===\n");

    println!("Delivering the same confirm tap three times:");
    let tap = InboundAction::new(42, "confirm_deal", 7001);
    let (limiter_ref, confirmations_ref) = (&limiter, &confirmations);
    for delivery in 1..=3 {
        let outcome = dispatcher
            .dispatch(
                &tap,
                || async move { info!(delivery, "duplicate acknowledged") },
                || async move {
                    limiter_ref.acquire().await;
                    info!(delivery, "provider called");
                    confirmations_ref
                        .record_once("deal-7001".into(), 42_i64.into())
                        .await
                },
            )
            .await;

        match outcome {
            Dispatched::Executed(record) => {
                let record = record?;
                println!("  delivery {delivery}: handled, confirmations = {}", record.count);
            }
            Dispatched::Duplicate => println!("  delivery {delivery}: duplicate"),
        }
    }

    println!("\nSending five provider calls through a bucket of 2:");
    let start = tokio::time::Instant::now();
    for call in 1..=5 {
        limiter.acquire().await;
        println!("  call {call} at {:?}", start.elapsed());
    }

    println!("\nRecording confirmations from actors 7, 8 and 7 again:");
    for actor in [7_i64, 8, 7] {
        confirmations
            .record_once_then("deal-7002".into(), actor.into(), |count| async move {
                println!("  actor {actor} confirmed first time, total {count}");
            })
            .await?;
    }

    let stats = dedup.stats();
    println!("\n=== Example Complete ===");
    println!(
        "Dedup: {} processed, {} suppressed; limiter: {} granted, {} waited",
        stats.processed,
        stats.deduplicated,
        limiter.stats().granted,
        limiter.stats().waited
    );

    sweeper.shutdown().await?;
    Ok(())
}
