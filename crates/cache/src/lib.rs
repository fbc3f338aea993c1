//! kapply cache: a local, eventually-consistent read cache fed by watcher deltas.
//!
//! Writes never go through here. Readers may see stale objects until the
//! watcher delivers the corresponding delta.

#![forbid(unsafe_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use kapply_core::{Delta, DeltaKind, ObjectKey};
use metrics::counter;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Coalescing queue keyed by object key with FIFO order.
///
/// Never drops a delta: once `cap` distinct keys are pending the owner must drain
/// before pushing more (see [`Coalescer::is_full`]).
pub struct Coalescer {
    map: FxHashMap<ObjectKey, Delta>,
    order: VecDeque<ObjectKey>,
    cap: usize,
}

impl Coalescer {
    pub fn with_capacity(cap: usize) -> Self {
        Self { map: FxHashMap::default(), order: VecDeque::new(), cap: cap.max(1) }
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
    pub fn is_full(&self) -> bool { self.map.len() >= self.cap }

    /// Queue `d`, replacing any pending delta for the same key in place.
    pub fn push(&mut self, d: Delta) {
        if !self.map.contains_key(&d.key) {
            self.order.push_back(d.key.clone());
        }
        self.map.insert(d.key.clone(), d);
    }

    pub fn drain_ready(&mut self) -> Vec<Delta> {
        let mut out = Vec::with_capacity(self.order.len());
        while let Some(key) = self.order.pop_front() {
            if let Some(d) = self.map.remove(&key) {
                out.push(d);
            }
        }
        out
    }
}

/// Immutable view of the cache at one epoch.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub epoch: u64,
    pub items: FxHashMap<ObjectKey, serde_json::Value>,
    /// Namespaces whose full listing has landed; `None` stands for every namespace.
    pub synced: BTreeSet<Option<String>>,
}

impl CacheSnapshot {
    pub fn get(&self, key: &ObjectKey) -> Option<&serde_json::Value> { self.items.get(key) }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

/// Builds snapshots from batches of deltas.
#[derive(Default)]
pub struct CacheBuilder {
    epoch: u64,
    items: FxHashMap<ObjectKey, serde_json::Value>,
    synced: BTreeSet<Option<String>>,
}

impl CacheBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn apply(&mut self, batch: Vec<Delta>) {
        for d in batch {
            match d.kind {
                DeltaKind::Applied => { self.items.insert(d.key, d.raw); }
                DeltaKind::Deleted => { self.items.remove(&d.key); }
                DeltaKind::Synced => { self.synced.insert(d.key.namespace); }
            }
        }
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn freeze(&self) -> Arc<CacheSnapshot> {
        Arc::new(CacheSnapshot { epoch: self.epoch, items: self.items.clone(), synced: self.synced.clone() })
    }
}

/// Read handle shared by cache-backed stores.
#[derive(Clone)]
pub struct CacheHandle {
    snap: Arc<ArcSwap<CacheSnapshot>>,
    epoch_rx: watch::Receiver<u64>,
    /// Namespaces fed into this cache; `None` means every namespace.
    namespaces: Option<Arc<BTreeSet<String>>>,
}

impl CacheHandle {
    pub fn current(&self) -> Arc<CacheSnapshot> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }

    /// Whether reads for `namespace` should be answered from this cache: the
    /// namespace is fed into it and its first full listing has landed.
    pub fn covers(&self, namespace: Option<&str>) -> bool {
        let snap = self.current();
        match (&self.namespaces, namespace) {
            (None, _) => snap.synced.contains(&None),
            (Some(set), Some(ns)) => set.contains(ns) && snap.synced.contains(&Some(ns.to_string())),
            (Some(_), None) => false,
        }
    }

    /// Every namespace fed into this cache has been listed at least once.
    pub fn is_synced(&self) -> bool {
        let snap = self.current();
        match &self.namespaces {
            None => snap.synced.contains(&None),
            Some(set) => set.iter().all(|ns| snap.synced.contains(&Some(ns.clone()))),
        }
    }

    pub fn get(&self, namespace: Option<&str>, name: &str) -> Option<serde_json::Value> {
        self.current().get(&ObjectKey::new(namespace, name)).cloned()
    }

    /// Wait until the cache reaches `epoch`, giving up after `timeout`. Returns whether it got there.
    pub async fn wait_for_epoch(&self, epoch: u64, timeout: Duration) -> bool {
        self.wait_until(timeout, |h| h.current().epoch >= epoch).await
    }

    /// Wait until [`CacheHandle::is_synced`], giving up after `timeout`.
    pub async fn wait_synced(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, CacheHandle::is_synced).await
    }

    async fn wait_until(&self, timeout: Duration, done: impl Fn(&CacheHandle) -> bool) -> bool {
        let mut rx = self.subscribe_epoch();
        let deadline = tokio::time::Instant::now() + timeout;
        while !done(self) {
            let rem = deadline.saturating_duration_since(tokio::time::Instant::now());
            if rem.is_zero() { return false; }
            match tokio::time::timeout(rem, rx.changed()).await {
                Ok(Ok(())) => {}
                _ => return done(self),
            }
        }
        true
    }
}

/// Spawn an ingest loop consuming deltas and swapping snapshots. Returns a sender for deltas and a read handle.
///
/// Pending deltas are flushed every 8ms, and immediately once `cap` distinct keys
/// are pending; senders wait on the bounded channel meanwhile.
pub fn spawn_ingest(cap: usize, namespaces: Option<BTreeSet<String>>) -> (mpsc::Sender<Delta>, CacheHandle) {
    let (tx, mut rx) = mpsc::channel::<Delta>(cap.max(1));
    let snap = Arc::new(ArcSwap::from_pointee(CacheSnapshot::default()));
    let (epoch_tx, epoch_rx) = watch::channel(0u64);
    let snap_clone = Arc::clone(&snap);

    tokio::spawn(async move {
        let mut coalescer = Coalescer::with_capacity(cap);
        let mut builder = CacheBuilder::new();
        let mut ticker = tokio::time::interval(Duration::from_millis(8));
        let publish = |coalescer: &mut Coalescer, builder: &mut CacheBuilder| {
            let batch = coalescer.drain_ready();
            if !batch.is_empty() {
                builder.apply(batch);
                let next = builder.freeze();
                let epoch = next.epoch;
                snap_clone.store(next);
                let _ = epoch_tx.send(epoch);
            }
        };
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    match maybe {
                        Some(d) => {
                            coalescer.push(d);
                            if coalescer.is_full() {
                                counter!("cache_full_flushes_total", 1u64);
                                publish(&mut coalescer, &mut builder);
                            }
                        }
                        None => {
                            debug!("delta channel closed; draining and exiting cache ingest loop");
                            publish(&mut coalescer, &mut builder);
                            break;
                        }
                    }
                }
                _ = ticker.tick() => publish(&mut coalescer, &mut builder),
            }
        }
        info!("cache ingest loop stopped");
    });

    let namespaces = namespaces.map(Arc::new);
    (tx, CacheHandle { snap, epoch_rx, namespaces })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(ns: &str, name: &str, kind: DeltaKind, v: &str) -> Delta {
        Delta {
            key: ObjectKey::new(Some(ns), name),
            kind,
            raw: serde_json::json!({ "metadata": { "name": name, "namespace": ns }, "data": { "v": v } }),
        }
    }

    #[test]
    fn coalescer_keeps_latest_and_never_drops() {
        let mut c = Coalescer::with_capacity(2);
        c.push(delta("ns", "a", DeltaKind::Applied, "1"));
        c.push(delta("ns", "a", DeltaKind::Applied, "2"));
        assert_eq!(c.len(), 1);
        assert!(!c.is_full());
        c.push(delta("ns", "b", DeltaKind::Applied, "1"));
        assert!(c.is_full());
        c.push(delta("ns", "c", DeltaKind::Applied, "1"));
        let out = c.drain_ready();
        let names: Vec<_> = out.iter().map(|d| d.key.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(out[0].raw["data"]["v"], "2");
        assert!(c.is_empty());
    }

    #[test]
    fn builder_records_synced_namespaces() {
        let mut b = CacheBuilder::new();
        b.apply(vec![Delta::synced(Some("ns"))]);
        let snap = b.freeze();
        assert_eq!(snap.epoch, 1);
        assert!(snap.is_empty());
        assert!(snap.synced.contains(&Some("ns".to_string())));
    }

    #[test]
    fn coverage_follows_synced_namespaces() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let (tx, all) = spawn_ingest(4, None);
            assert!(!all.covers(Some("anything")));
            tx.send(Delta::synced(None)).await.unwrap();
            assert!(all.wait_synced(Duration::from_secs(5)).await);
            assert!(all.covers(Some("anything")));

            let set: BTreeSet<String> = ["kube-system".to_string(), "apps".to_string()].into_iter().collect();
            let (tx2, some) = spawn_ingest(4, Some(set));
            tx2.send(Delta::synced(Some("kube-system"))).await.unwrap();
            assert!(some.wait_for_epoch(1, Duration::from_secs(5)).await);
            assert!(some.covers(Some("kube-system")));
            assert!(!some.covers(Some("apps")));
            assert!(!some.covers(Some("default")));
            assert!(!some.covers(None));
            assert!(!some.is_synced());
            assert!(!some.wait_synced(Duration::from_millis(50)).await);
        });
    }
}
