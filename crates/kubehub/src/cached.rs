use std::sync::Arc;

use kapply_cache::CacheHandle;
use kapply_core::{ObjectKey, ObjectStore, StoreError};
use tracing::trace;

use crate::KubeObject;

/// Cache-backed reads, direct writes.
///
/// Reads for namespaces the cache covers (fed into it and listed at least once) are
/// answered locally and may lag behind the server; everything else, writes
/// included, goes to `live`.
pub struct CachedStore<K> {
    cache: CacheHandle,
    live: Arc<dyn ObjectStore<K>>,
}

impl<K: KubeObject> CachedStore<K> {
    pub fn new(cache: CacheHandle, live: Arc<dyn ObjectStore<K>>) -> Self { Self { cache, live } }
}

#[async_trait::async_trait]
impl<K: KubeObject> ObjectStore<K> for CachedStore<K> {
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError> {
        if !self.cache.covers(namespace) {
            return self.live.get(namespace, name).await;
        }
        trace!(ns = ?namespace, name, "cache get");
        match self.cache.get(namespace, name) {
            Some(raw) => serde_json::from_value(raw).map_err(|e| StoreError::Codec(e.to_string())),
            None => Err(StoreError::not_found(K::kind(&()), ObjectKey::new(namespace, name).to_string())),
        }
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> { self.live.create(obj).await }

    async fn update(&self, obj: &K) -> Result<K, StoreError> { self.live.update(obj).await }
}
