//! kapply kubehub: backing stores for the apply engine.
//!
//! - [`LiveStore`]: direct round trips through a kube `Client`
//! - [`CachedStore`]: reads from a local watcher-fed cache, writes go live
//! - [`MemoryCluster`]: an in-process object store with API-server-like semantics

#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::sync::Arc;

use anyhow::{Context, Result};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kapply_core::{ObjectKey, ObjectStore, StoreError};
use kube::{api::Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};

mod cached;
mod live;
mod memory;
mod watch;

pub use cached::CachedStore;
pub use live::LiveStore;
pub use memory::{MemoryCluster, MemoryStore, OpStats};
pub use watch::{start_watcher, KubeCaches};

/// Typed kube objects the stores know how to move around.
pub trait KubeObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> KubeObject for T where
    T: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Builds an `Api` handle appropriate for a resource scope.
pub trait ApiScope {
    fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>;
}

impl ApiScope for NamespaceResourceScope {
    fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::default_namespaced(client),
        }
    }
}

impl ApiScope for ClusterResourceScope {
    fn api<K>(client: Client, _namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        Api::all(client)
    }
}

/// Stable key for a kind: `version/Kind` for the core group, `group/version/Kind` otherwise.
pub fn gvk_key<K: Resource<DynamicType = ()>>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

pub fn object_key<K: Resource>(obj: &K) -> ObjectKey {
    let meta = obj.meta();
    ObjectKey::new(meta.namespace.as_deref(), meta.name.as_deref().unwrap_or_default())
}

/// Map a kube client error onto the store taxonomy.
pub fn store_error(kind: &str, key: &ObjectKey, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::not_found(kind, key.to_string()),
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::already_exists(kind, key.to_string())
        }
        kube::Error::Api(ae) => StoreError::Api { code: ae.code, message: ae.message },
        kube::Error::SerdeError(e) => StoreError::Codec(e.to_string()),
        other => StoreError::Transport(other.to_string()),
    }
}

/// Client for the current kube context.
pub async fn kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client from current context")
}

/// Where a store handle sends its requests.
#[derive(Clone)]
pub enum Backend {
    Kube(Client),
    Memory(MemoryCluster),
}

impl Backend {
    pub fn store<K>(&self) -> Arc<dyn ObjectStore<K>>
    where
        K: KubeObject,
        K::Scope: ApiScope,
    {
        match self {
            Backend::Kube(client) => Arc::new(LiveStore::<K>::new(client.clone())),
            Backend::Memory(cluster) => Arc::new(cluster.store::<K>()),
        }
    }
}

impl From<Client> for Backend {
    fn from(c: Client) -> Self { Backend::Kube(c) }
}

impl From<MemoryCluster> for Backend {
    fn from(m: MemoryCluster) -> Self { Backend::Memory(m) }
}
