use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kapply_cache::{spawn_ingest, CacheHandle};
use kapply_core::{Delta, DeltaKind, ObjectKey};
use kube::{
    api::Api,
    runtime::{
        watcher::{self, Event},
        WatchStreamExt,
    },
    Client,
};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{gvk_key, object_key, ApiScope, KubeObject};

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

fn delta_from<K: KubeObject>(obj: &K, kind: DeltaKind) -> Result<Delta> {
    let mut raw = serde_json::to_value(obj).context("serializing watched object")?;
    strip_managed_fields(&mut raw);
    Ok(Delta { key: object_key(obj), kind, raw })
}

/// List+watch one kind (optionally one namespace) and forward deltas into `delta_tx`.
///
/// Every completed listing, empty or not, is followed by a [`Delta::synced`] marker;
/// a relist also deletes every key the previous listing had but the new one lacks.
/// Watch errors are logged and retried with backoff. Returns when `delta_tx` closes
/// or the stream ends.
pub async fn start_watcher<K>(client: Client, namespace: Option<&str>, delta_tx: mpsc::Sender<Delta>) -> Result<()>
where
    K: KubeObject,
    K::Scope: ApiScope,
{
    let gvk = gvk_key::<K>();
    let api: Api<K> = match namespace {
        Some(ns) => <K::Scope as ApiScope>::api::<K>(client, Some(ns)),
        None => Api::all(client),
    };
    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    info!(gvk = %gvk, ns = ?namespace, "watcher started");
    let mut known: HashSet<ObjectKey> = HashSet::new();
    while let Some(ev) = stream.next().await {
        let ev = match ev {
            Ok(ev) => ev,
            Err(e) => {
                counter!("watch_errors_total", 1u64);
                warn!(gvk = %gvk, ns = ?namespace, error = %e, "watch error; retrying");
                continue;
            }
        };
        counter!("watch_events_total", 1u64);
        let mut batch = Vec::new();
        match ev {
            Event::Applied(o) => {
                let d = delta_from(&o, DeltaKind::Applied)?;
                known.insert(d.key.clone());
                batch.push(d);
            }
            Event::Deleted(o) => {
                let d = delta_from(&o, DeltaKind::Deleted)?;
                known.remove(&d.key);
                batch.push(d);
            }
            Event::Restarted(list) => {
                debug!(gvk = %gvk, count = list.len(), "watch restart");
                let mut fresh = HashSet::with_capacity(list.len());
                for o in list.iter() {
                    let d = delta_from(o, DeltaKind::Applied)?;
                    fresh.insert(d.key.clone());
                    batch.push(d);
                }
                for gone in known.difference(&fresh) {
                    batch.push(Delta { key: gone.clone(), kind: DeltaKind::Deleted, raw: serde_json::Value::Null });
                }
                batch.push(Delta::synced(namespace));
                known = fresh;
            }
        }
        for d in batch {
            if delta_tx.send(d).await.is_err() {
                debug!(gvk = %gvk, "delta receiver gone; stopping watcher");
                return Ok(());
            }
        }
    }
    warn!(gvk = %gvk, "watcher stream ended");
    Ok(())
}

/// Watcher-fed caches for the heavily-read kinds.
#[derive(Clone, Default)]
pub struct KubeCaches {
    pub config_maps: Option<CacheHandle>,
    pub secrets: Option<CacheHandle>,
}

impl KubeCaches {
    /// Start ConfigMap and Secret caches for `namespaces` (every namespace when empty).
    pub fn start(client: Client, namespaces: &[String], cap: usize) -> Self {
        Self {
            config_maps: Some(spawn_cache::<ConfigMap>(client.clone(), namespaces, cap)),
            secrets: Some(spawn_cache::<Secret>(client, namespaces, cap)),
        }
    }

    /// Wait until every cache has listed all its namespaces, giving up after `timeout`.
    /// Until then reads for unlisted namespaces go to the live store.
    pub async fn wait_synced(&self, timeout: Duration) -> bool {
        let mut synced = true;
        for cache in [&self.config_maps, &self.secrets].into_iter().flatten() {
            synced &= cache.wait_synced(timeout).await;
        }
        synced
    }
}

fn spawn_cache<K>(client: Client, namespaces: &[String], cap: usize) -> CacheHandle
where
    K: KubeObject,
    K::Scope: ApiScope,
{
    let scope: Option<BTreeSet<String>> =
        if namespaces.is_empty() { None } else { Some(namespaces.iter().cloned().collect()) };
    let (tx, handle) = spawn_ingest(cap, scope);
    let targets: Vec<Option<String>> =
        if namespaces.is_empty() { vec![None] } else { namespaces.iter().cloned().map(Some).collect() };
    for ns in targets {
        let client = client.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = start_watcher::<K>(client, ns.as_deref(), tx).await {
                error!(gvk = %gvk_key::<K>(), ns = ?ns, error = ?e, "cache watcher failed");
            }
        });
    }
    handle
}
