use std::marker::PhantomData;

use kapply_core::{ObjectKey, ObjectStore, StoreError};
use kube::{
    api::{Api, PostParams},
    Client,
};
use tracing::debug;

use crate::{object_key, store_error, ApiScope, KubeObject};

/// Direct store: every call is one round trip to the API server.
pub struct LiveStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> LiveStore<K>
where
    K: KubeObject,
    K::Scope: ApiScope,
{
    pub fn new(client: Client) -> Self { Self { client, _kind: PhantomData } }

    fn api(&self, namespace: Option<&str>) -> Api<K> {
        <K::Scope as ApiScope>::api::<K>(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl<K> ObjectStore<K> for LiveStore<K>
where
    K: KubeObject,
    K::Scope: ApiScope,
{
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError> {
        let kind = K::kind(&());
        debug!(kind = %kind, ns = ?namespace, name, "live get");
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| store_error(&kind, &ObjectKey::new(namespace, name), e))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj);
        self.api(key.namespace.as_deref())
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| store_error(&K::kind(&()), &key, e))
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj);
        if key.name.is_empty() {
            return Err(StoreError::Invalid("metadata.name is required for update".into()));
        }
        self.api(key.namespace.as_deref())
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| store_error(&K::kind(&()), &key, e))
    }
}
