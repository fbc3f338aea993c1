use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use kapply_core::{ObjectKey, ObjectStore, StoreError};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::{gvk_key, object_key, KubeObject};

/// Per-kind request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    pub gets: u64,
    pub creates: u64,
    pub updates: u64,
}

impl OpStats {
    pub fn writes(&self) -> u64 { self.creates + self.updates }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, ObjectKey), Json>,
    stats: BTreeMap<String, OpStats>,
    last_rv: u64,
}

/// In-process object store keyed by kind and namespace/name.
///
/// Mimics the API server where the engine can observe it: uid, resourceVersion and
/// creationTimestamp are assigned on create, create refuses existing objects, update
/// refuses missing ones and keeps server-owned fields (uid, creationTimestamp, status).
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<State>>,
}

impl MemoryCluster {
    pub fn new() -> Self { Self::default() }

    pub fn store<K: KubeObject>(&self) -> MemoryStore<K> {
        MemoryStore { cluster: self.clone(), _kind: PhantomData }
    }

    /// Store an object as if another actor had created it. Not counted in [`OpStats`].
    pub fn seed<K: KubeObject>(&self, obj: &K) -> Result<K, StoreError> {
        let mut st = self.lock();
        let gvk = gvk_key::<K>();
        let key = object_key(obj);
        let raw = assign_server_fields(&mut st, to_json(obj)?, None);
        st.objects.insert((gvk, key), raw.clone());
        from_json(raw)
    }

    pub fn stats<K: KubeObject>(&self) -> OpStats {
        self.lock().stats.get(&gvk_key::<K>()).copied().unwrap_or_default()
    }

    pub fn total_writes(&self) -> u64 {
        self.lock().stats.values().map(|s| s.writes()).sum()
    }

    pub fn get_raw<K: KubeObject>(&self, namespace: Option<&str>, name: &str) -> Option<Json> {
        self.lock().objects.get(&(gvk_key::<K>(), ObjectKey::new(namespace, name))).cloned()
    }

    pub fn len(&self) -> usize { self.lock().objects.len() }
    pub fn is_empty(&self) -> bool { self.lock().objects.is_empty() }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Typed view of a [`MemoryCluster`] for one kind.
pub struct MemoryStore<K> {
    cluster: MemoryCluster,
    _kind: PhantomData<fn() -> K>,
}

#[async_trait::async_trait]
impl<K: KubeObject> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError> {
        let gvk = gvk_key::<K>();
        let key = ObjectKey::new(namespace, name);
        let raw = {
            let mut st = self.cluster.lock();
            st.stats.entry(gvk.clone()).or_default().gets += 1;
            st.objects.get(&(gvk, key.clone())).cloned()
        };
        match raw {
            Some(raw) => from_json(raw),
            None => Err(StoreError::not_found(K::kind(&()), key.to_string())),
        }
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let gvk = gvk_key::<K>();
        let key = object_key(obj);
        if key.name.is_empty() {
            return Err(StoreError::Invalid("metadata.name is required".into()));
        }
        if obj.meta().resource_version.is_some() {
            return Err(StoreError::Invalid("resourceVersion should not be set on objects to be created".into()));
        }
        let raw = to_json(obj)?;
        let mut st = self.cluster.lock();
        st.stats.entry(gvk.clone()).or_default().creates += 1;
        if st.objects.contains_key(&(gvk.clone(), key.clone())) {
            return Err(StoreError::already_exists(K::kind(&()), key.to_string()));
        }
        let raw = assign_server_fields(&mut st, raw, None);
        st.objects.insert((gvk, key), raw.clone());
        drop(st);
        from_json(raw)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let gvk = gvk_key::<K>();
        let key = object_key(obj);
        let raw = to_json(obj)?;
        let mut st = self.cluster.lock();
        st.stats.entry(gvk.clone()).or_default().updates += 1;
        let Some(stored) = st.objects.get(&(gvk.clone(), key.clone())).cloned() else {
            return Err(StoreError::not_found(K::kind(&()), key.to_string()));
        };
        let stored_rv = stored.pointer("/metadata/resourceVersion").and_then(|v| v.as_str()).unwrap_or_default();
        if let Some(rv) = obj.meta().resource_version.as_deref() {
            if rv != stored_rv {
                return Err(StoreError::Api {
                    code: 409,
                    message: format!("the object has been modified; resourceVersion {} is stale", rv),
                });
            }
        }
        let raw = assign_server_fields(&mut st, raw, Some(&stored));
        st.objects.insert((gvk, key), raw.clone());
        drop(st);
        from_json(raw)
    }
}

fn assign_server_fields(st: &mut State, mut raw: Json, stored: Option<&Json>) -> Json {
    st.last_rv += 1;
    let rv = st.last_rv.to_string();
    if let Some(obj) = raw.as_object_mut() {
        match stored.and_then(|s| s.get("status")) {
            Some(status) => { obj.insert("status".into(), status.clone()); }
            None if stored.is_some() => { obj.remove("status"); }
            None => {}
        }
        let meta = obj.entry("metadata").or_insert_with(|| Json::Object(Default::default()));
        if let Some(meta) = meta.as_object_mut() {
            let stored_meta = stored.and_then(|s| s.get("metadata"));
            let uid = stored_meta
                .and_then(|m| m.get("uid"))
                .cloned()
                .unwrap_or_else(|| Json::String(Uuid::new_v4().to_string()));
            let created = stored_meta
                .and_then(|m| m.get("creationTimestamp"))
                .cloned()
                .unwrap_or_else(|| Json::String(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()));
            meta.insert("uid".into(), uid);
            meta.insert("creationTimestamp".into(), created);
            meta.insert("resourceVersion".into(), Json::String(rv));
        }
    }
    raw
}

fn to_json<K: KubeObject>(obj: &K) -> Result<Json, StoreError> {
    serde_json::to_value(obj).map_err(|e| StoreError::Codec(e.to_string()))
}

fn from_json<K: KubeObject>(raw: Json) -> Result<K, StoreError> {
    serde_json::from_value(raw).map_err(|e| StoreError::Codec(e.to_string()))
}
