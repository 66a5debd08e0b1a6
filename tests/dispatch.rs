//! Integration tests for the inbound action entry point.

use escrow_gate::{
    ActionDeduplicator, ActionDispatcher, DedupConfig, Dispatched, InboundAction,
    TokenBucketLimiter, TokioClock,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn dispatcher() -> ActionDispatcher {
    let dedup = ActionDeduplicator::builder()
        .with_config(DedupConfig::default())
        .with_clock(Arc::new(TokioClock::new()))
        .build()
        .unwrap();
    ActionDispatcher::new(Arc::new(dedup))
}

#[tokio::test(start_paused = true)]
async fn test_redelivery_acknowledged_without_side_effect() {
    let dispatcher = dispatcher();
    let payments = Arc::new(AtomicUsize::new(0));
    let acks = Arc::new(AtomicUsize::new(0));
    let action = InboundAction::new(42, "release_funds", 7001);

    for _ in 0..4 {
        let payments = Arc::clone(&payments);
        let acks = Arc::clone(&acks);
        dispatcher
            .dispatch(
                &action,
                move || async move {
                    acks.fetch_add(1, Ordering::SeqCst);
                },
                move || async move {
                    payments.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;
    }

    assert_eq!(payments.load(Ordering::SeqCst), 1);
    assert_eq!(acks.load(Ordering::SeqCst), 3);
    assert_eq!(dispatcher.deduplicator().stats().deduplicated, 3);
}

#[tokio::test(start_paused = true)]
async fn test_same_control_on_other_message_runs() {
    let dispatcher = dispatcher();

    let first = dispatcher
        .dispatch(&InboundAction::new(42, "like", 100), || async {}, || async { 1 })
        .await;
    let second = dispatcher
        .dispatch(&InboundAction::new(42, "like", 101), || async {}, || async { 2 })
        .await;

    assert_eq!(first, Dispatched::Executed(1));
    assert_eq!(second, Dispatched::Executed(2));
}

#[tokio::test(start_paused = true)]
async fn test_handler_runs_again_after_window() {
    let dispatcher = dispatcher();
    let action = InboundAction::new(5, "open_dispute", 12);

    assert!(dispatcher
        .dispatch(&action, || async {}, || async {})
        .await
        .is_executed());
    tokio::time::advance(Duration::from_millis(3_000)).await;
    assert!(dispatcher
        .dispatch(&action, || async {}, || async {})
        .await
        .is_executed());
}

#[tokio::test(start_paused = true)]
async fn test_handler_paced_by_limiter() {
    let dispatcher = dispatcher();
    let limiter = Arc::new(TokenBucketLimiter::new(2.0, 2.0).unwrap());
    let start = tokio::time::Instant::now();

    for context in 0..4 {
        let limiter = Arc::clone(&limiter);
        let outcome = dispatcher
            .dispatch(
                &InboundAction::new(1, "confirm_payment", context),
                || async {},
                move || async move {
                    limiter.acquire().await;
                    context
                },
            )
            .await;
        assert_eq!(outcome.into_executed(), Some(context));
    }

    // Two from the burst, then two at 500ms each
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1_050), "took {:?}", elapsed);
}
