//! The per-kind capability set the engine works through.

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kapply_core::{ObjectStore, StoreError};
use kapply_kubehub::KubeObject;
use serde::Serialize;

use crate::kinds::Content;

/// Uniform store operations over one object kind, so the engine never branches on kind.
#[async_trait::async_trait]
pub trait ApplyAdapter: Send + Sync {
    type Object: Serialize + Send + Sync;

    /// Label used in logs and events.
    fn kind(&self) -> &str;

    /// Fetch the stored counterpart of `required`. Absent objects yield a not-found error.
    async fn get(&self, required: &Self::Object) -> Result<Self::Object, StoreError>;
    async fn create(&self, obj: &Self::Object) -> Result<Self::Object, StoreError>;
    async fn update(&self, obj: &Self::Object) -> Result<Self::Object, StoreError>;

    fn deep_copy(&self, obj: &Self::Object) -> Self::Object;
    /// Content equality ignoring metadata and fields the server owns.
    fn deep_equal(&self, a: &Self::Object, b: &Self::Object) -> bool;

    fn object_meta<'a>(&self, obj: &'a Self::Object) -> &'a ObjectMeta;
    fn object_meta_mut<'a>(&self, obj: &'a mut Self::Object) -> &'a mut ObjectMeta;
}

/// Adapter for any typed kube object with a [`Content`] definition.
pub struct KubeAdapter<K> {
    store: Arc<dyn ObjectStore<K>>,
    kind: String,
}

impl<K: KubeObject> KubeAdapter<K> {
    pub fn new(store: Arc<dyn ObjectStore<K>>) -> Self {
        Self { store, kind: K::kind(&()).into_owned() }
    }
}

#[async_trait::async_trait]
impl<K> ApplyAdapter for KubeAdapter<K>
where
    K: KubeObject + Content,
{
    type Object = K;

    fn kind(&self) -> &str { &self.kind }

    async fn get(&self, required: &K) -> Result<K, StoreError> {
        let meta = required.meta();
        let name = meta.name.as_deref().unwrap_or_default();
        self.store.get(meta.namespace.as_deref(), name).await
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> { self.store.create(obj).await }

    async fn update(&self, obj: &K) -> Result<K, StoreError> { self.store.update(obj).await }

    fn deep_copy(&self, obj: &K) -> K { obj.clone() }

    fn deep_equal(&self, a: &K, b: &K) -> bool { a.content_eq(b) }

    fn object_meta<'a>(&self, obj: &'a K) -> &'a ObjectMeta { obj.meta() }

    fn object_meta_mut<'a>(&self, obj: &'a mut K) -> &'a mut ObjectMeta { obj.meta_mut() }
}
