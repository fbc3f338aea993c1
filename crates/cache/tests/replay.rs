#![forbid(unsafe_code)]

use std::time::Duration;

use kapply_cache::{spawn_ingest, CacheBuilder};
use kapply_core::{Delta, DeltaKind, ObjectKey};

fn obj(name: &str, ns: &str, value: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": name, "namespace": ns },
        "data": { "value": value },
    })
}

fn applied(name: &str, ns: &str, value: &str) -> Delta {
    Delta { key: ObjectKey::new(Some(ns), name), kind: DeltaKind::Applied, raw: obj(name, ns, value) }
}

#[test]
fn replay_basic_sequence() {
    let mut cb = CacheBuilder::new();

    let deltas = vec![
        applied("a", "ns", "1"),
        // same key again: builder just replaces
        applied("a", "ns", "1"),
        applied("b", "other", "1"),
        applied("a", "ns", "2"),
        Delta { key: ObjectKey::new(Some("other"), "b"), kind: DeltaKind::Deleted, raw: serde_json::json!({}) },
    ];

    cb.apply(deltas[..3].to_vec());
    let snap1 = cb.freeze();
    assert_eq!(snap1.epoch, 1);
    assert_eq!(snap1.len(), 2);
    assert_eq!(snap1.get(&ObjectKey::new(Some("ns"), "a")).unwrap()["data"]["value"], "1");

    cb.apply(deltas[3..].to_vec());
    let snap2 = cb.freeze();
    assert_eq!(snap2.epoch, 2);
    assert_eq!(snap2.len(), 1);
    assert_eq!(snap2.get(&ObjectKey::new(Some("ns"), "a")).unwrap()["data"]["value"], "2");
    // earlier snapshots are immutable
    assert_eq!(snap1.len(), 2);
}

#[tokio::test]
async fn ingest_publishes_snapshots() {
    let (tx, handle) = spawn_ingest(16, None);
    assert!(handle.get(Some("ns"), "a").is_none());

    tx.send(applied("a", "ns", "1")).await.unwrap();
    assert!(handle.wait_for_epoch(1, Duration::from_secs(5)).await);
    assert_eq!(handle.get(Some("ns"), "a").unwrap()["data"]["value"], "1");

    let before = handle.current().epoch;
    tx.send(Delta { key: ObjectKey::new(Some("ns"), "a"), kind: DeltaKind::Deleted, raw: serde_json::json!({}) })
        .await
        .unwrap();
    assert!(handle.wait_for_epoch(before + 1, Duration::from_secs(5)).await);
    assert!(handle.get(Some("ns"), "a").is_none());
}

#[tokio::test]
async fn closing_the_channel_flushes_pending_deltas() {
    let (tx, handle) = spawn_ingest(16, None);
    tx.send(applied("z", "ns", "9")).await.unwrap();
    drop(tx);
    assert!(handle.wait_for_epoch(1, Duration::from_secs(5)).await);
    assert!(handle.get(Some("ns"), "z").is_some());
}

#[tokio::test]
async fn bursts_beyond_capacity_are_not_lost() {
    let scope = ["ns".to_string()].into_iter().collect();
    let (tx, handle) = spawn_ingest(4, Some(scope));
    for i in 0..50 {
        tx.send(applied(&format!("cm{}", i), "ns", "1")).await.unwrap();
    }
    tx.send(Delta::synced(Some("ns"))).await.unwrap();
    assert!(handle.wait_synced(Duration::from_secs(5)).await);

    let snap = handle.current();
    assert_eq!(snap.len(), 50);
    assert!(handle.get(Some("ns"), "cm0").is_some());
    assert!(handle.covers(Some("ns")));
}

#[tokio::test]
async fn empty_listing_still_syncs() {
    let (tx, handle) = spawn_ingest(16, None);
    tx.send(Delta::synced(None)).await.unwrap();
    assert!(handle.wait_synced(Duration::from_secs(5)).await);
    assert!(handle.current().is_empty());
    assert!(handle.covers(Some("anywhere")));
}
