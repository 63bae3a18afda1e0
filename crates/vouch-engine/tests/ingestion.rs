//! Ingestion, notification, and refresh behavior of the engine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use vouch_core::{ConnectionStatus, MessageId, TestimonialEnvelope, TransportEvent, VouchError};
use vouch_engine::{EngineConfig, TestimonialEngine};
use vouch_testkit::{addr, envelope, init_tracing, MemoryLedger, MemoryTransport, ALICE, BOB, CAROL};

async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}

fn engine_with(
    ledger: Arc<MemoryLedger>,
    transport: Arc<MemoryTransport>,
) -> TestimonialEngine {
    init_tracing();
    TestimonialEngine::new(EngineConfig::default(), addr(BOB), ledger, transport)
}

async fn deliver(engine: &TestimonialEngine, env: TestimonialEnvelope) {
    engine
        .ingest_handle()
        .send(TransportEvent::Envelope(env))
        .await
        .unwrap();
}

async fn connect(engine: &TestimonialEngine) {
    engine
        .ingest_handle()
        .send(TransportEvent::Connectivity(ConnectionStatus::Connected))
        .await
        .unwrap();
    eventually(|| async { engine.connection() == ConnectionStatus::Connected }).await;
}

#[tokio::test]
async fn ingestion_is_idempotent() {
    let engine = engine_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryTransport::new()),
    );

    // The same message id delivered three times yields one pending item.
    for _ in 0..3 {
        deliver(&engine, envelope("m1", ALICE, BOB, "Great work")).await;
    }
    deliver(&engine, envelope("m2", CAROL, BOB, "Solid engineer")).await;

    eventually(|| async { engine.pending().await.len() == 2 }).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.pending().await.len(), 2);
    assert_eq!(engine.unseen_count().await, 2);
}

#[tokio::test]
async fn malformed_envelopes_never_enter_the_store() {
    let engine = engine_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryTransport::new()),
    );

    let mut missing_id = envelope("x", ALICE, BOB, "hello");
    missing_id.id = None;
    deliver(&engine, missing_id).await;

    let mut bad_sender = envelope("m-bad", ALICE, BOB, "hello");
    bad_sender.sender_address = "0xnope".into();
    deliver(&engine, bad_sender).await;

    let mut empty_content = envelope("m-empty", ALICE, BOB, "hello");
    empty_content.content = "   ".into();
    deliver(&engine, empty_content).await;

    // Envelopes for another receiver are dropped too.
    deliver(&engine, envelope("m-other", ALICE, CAROL, "hello")).await;

    deliver(&engine, envelope("m-ok", ALICE, BOB, "hello")).await;
    eventually(|| async { engine.pending().await.len() == 1 }).await;
    assert_eq!(engine.pending().await[0].id, MessageId::from("m-ok"));
}

#[tokio::test]
async fn notification_count_tracks_last_clear() {
    let engine = engine_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryTransport::new()),
    );

    deliver(&engine, envelope("m1", ALICE, BOB, "one")).await;
    deliver(&engine, envelope("m2", CAROL, BOB, "two")).await;
    eventually(|| async { engine.unseen_count().await == 2 }).await;

    engine.clear_notifications().await;
    assert_eq!(engine.unseen_count().await, 0);

    deliver(&engine, envelope("m3", ALICE, BOB, "three")).await;
    eventually(|| async { engine.unseen_count().await == 1 }).await;

    let unseen = engine.notifications().await;
    assert_eq!(unseen.len(), 1);
    assert_eq!(unseen[0].id, MessageId::from("m3"));
}

#[tokio::test]
async fn connectivity_events_drive_the_monitor() {
    let engine = engine_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryTransport::new()),
    );
    assert_eq!(engine.connection(), ConnectionStatus::Disconnected);

    let tx = engine.ingest_handle();
    tx.send(TransportEvent::Connectivity(ConnectionStatus::Connecting))
        .await
        .unwrap();
    eventually(|| async { engine.connection() == ConnectionStatus::Connecting }).await;

    tx.send(TransportEvent::Connectivity(ConnectionStatus::Connected))
        .await
        .unwrap();
    eventually(|| async { engine.connection() == ConnectionStatus::Connected }).await;
}

#[tokio::test]
async fn refresh_requires_connection() {
    let engine = engine_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryTransport::new()),
    );
    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, VouchError::TransportUnavailable { .. }));
}

#[tokio::test]
async fn refresh_merges_history_idempotently() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    transport.push_history(envelope("m2", CAROL, BOB, "two")).await;
    // Duplicates and junk in the historical store are tolerated.
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    let mut junk = envelope("m3", ALICE, BOB, "three");
    junk.signature = String::new();
    transport.push_history(junk).await;

    let engine = engine_with(Arc::new(MemoryLedger::new()), transport);
    connect(&engine).await;

    assert_eq!(engine.refresh().await.unwrap(), 2);
    assert_eq!(engine.pending().await.len(), 2);

    // Re-running the same refresh merges nothing new.
    assert_eq!(engine.refresh().await.unwrap(), 0);
    assert_eq!(engine.pending().await.len(), 2);
}

#[tokio::test]
async fn overlapping_refresh_fails_fast() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    transport
        .set_history_delay(Some(Duration::from_millis(150)))
        .await;

    let engine = Arc::new(engine_with(Arc::new(MemoryLedger::new()), transport.clone()));
    connect(&engine).await;

    let slow = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.refresh().await })
    };
    eventually(|| async { engine.is_refreshing() }).await;

    // The second call is refused, not queued, and changes nothing.
    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, VouchError::RefreshBusy));
    assert_eq!(engine.pending().await.len(), 0);

    assert_eq!(slow.await.unwrap().unwrap(), 1);
    assert!(!engine.is_refreshing());
}

#[tokio::test]
async fn failed_refresh_releases_busy_and_leaves_store_unchanged() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    transport.set_fail_history(true);

    let engine = engine_with(Arc::new(MemoryLedger::new()), transport.clone());
    connect(&engine).await;

    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, VouchError::RefreshFailure { .. }));
    assert_eq!(engine.pending().await.len(), 0);
    assert!(!engine.is_refreshing());

    // The busy flag was released, so a retry can run.
    transport.set_fail_history(false);
    assert_eq!(engine.refresh().await.unwrap(), 1);
}

#[tokio::test]
async fn first_review_entry_refreshes_exactly_once() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;

    let engine = engine_with(Arc::new(MemoryLedger::new()), transport.clone());

    // Not connected yet: the one shot is not consumed.
    assert_eq!(engine.enter_review().await.unwrap(), None);

    connect(&engine).await;
    assert_eq!(engine.enter_review().await.unwrap(), Some(1));

    // Later history growth is not picked up automatically.
    transport.push_history(envelope("m2", CAROL, BOB, "two")).await;
    assert_eq!(engine.enter_review().await.unwrap(), None);
    assert_eq!(engine.pending().await.len(), 1);

    // Explicit refresh still works.
    assert_eq!(engine.refresh().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_first_review_entries_refresh_once() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    transport
        .set_history_delay(Some(Duration::from_millis(50)))
        .await;

    let engine = Arc::new(engine_with(Arc::new(MemoryLedger::new()), transport));
    connect(&engine).await;

    // The loser of the claim is a no-op, not an error.
    let (a, b) = tokio::join!(engine.enter_review(), engine.enter_review());
    let results = [a.unwrap(), b.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(engine.pending().await.len(), 1);

    // The one shot is consumed.
    assert_eq!(engine.enter_review().await.unwrap(), None);
}

#[tokio::test]
async fn review_entry_during_explicit_refresh_is_a_no_op() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    transport
        .set_history_delay(Some(Duration::from_millis(150)))
        .await;

    let engine = Arc::new(engine_with(Arc::new(MemoryLedger::new()), transport.clone()));
    connect(&engine).await;

    let slow = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.refresh().await })
    };
    eventually(|| async { engine.is_refreshing() }).await;

    assert_eq!(engine.enter_review().await.unwrap(), None);
    assert_eq!(slow.await.unwrap().unwrap(), 1);

    // The one shot was not consumed by the skipped entry.
    transport.set_history_delay(None).await;
    assert_eq!(engine.enter_review().await.unwrap(), Some(0));
}

#[tokio::test]
async fn failed_implicit_refresh_keeps_the_one_shot_available() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_history(envelope("m1", ALICE, BOB, "one")).await;
    transport.set_fail_history(true);

    let engine = engine_with(Arc::new(MemoryLedger::new()), transport.clone());
    connect(&engine).await;

    let err = engine.enter_review().await.unwrap_err();
    assert!(matches!(err, VouchError::RefreshFailure { .. }));

    transport.set_fail_history(false);
    assert_eq!(engine.enter_review().await.unwrap(), Some(1));
}
