//! Optional backing-store handles, one per API group family.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kapply_core::{ApplyError, ObjectStore};
use kapply_kubehub::{ApiScope, Backend, CachedStore, KubeCaches, KubeObject};

/// Handles the dispatcher routes through. Any of them may be absent; kinds that
/// need an absent handle fail with [`ApplyError::MissingClient`].
#[derive(Clone, Default)]
pub struct ClientHolder {
    kube: Option<Backend>,
    api_extensions: Option<Backend>,
    caches: Option<KubeCaches>,
}

impl ClientHolder {
    pub fn new() -> Self { Self::default() }

    /// Core, RBAC and storage kinds through `backend`.
    pub fn kubernetes(backend: impl Into<Backend>) -> Self { Self::new().with_kubernetes(backend) }

    pub fn with_kubernetes(mut self, backend: impl Into<Backend>) -> Self {
        self.kube = Some(backend.into());
        self
    }

    /// Serve ConfigMap and Secret reads from watcher-fed caches.
    pub fn with_kubernetes_caches(mut self, caches: KubeCaches) -> Self {
        self.caches = Some(caches);
        self
    }

    pub fn with_api_extensions(mut self, backend: impl Into<Backend>) -> Self {
        self.api_extensions = Some(backend.into());
        self
    }

    pub fn kube_store<K>(&self) -> Result<Arc<dyn ObjectStore<K>>, ApplyError>
    where
        K: KubeObject,
        K::Scope: ApiScope,
    {
        self.kube.as_ref().map(|b| b.store::<K>()).ok_or(ApplyError::MissingClient("kubeClient"))
    }

    pub fn api_extensions_store<K>(&self) -> Result<Arc<dyn ObjectStore<K>>, ApplyError>
    where
        K: KubeObject,
        K::Scope: ApiScope,
    {
        self.api_extensions
            .as_ref()
            .map(|b| b.store::<K>())
            .ok_or(ApplyError::MissingClient("apiExtensionsClient"))
    }

    pub fn config_maps_store(&self) -> Result<Arc<dyn ObjectStore<ConfigMap>>, ApplyError> {
        let live = self.kube_store::<ConfigMap>()?;
        match self.caches.as_ref().and_then(|c| c.config_maps.clone()) {
            Some(cache) => Ok(Arc::new(CachedStore::new(cache, live))),
            None => Ok(live),
        }
    }

    pub fn secrets_store(&self) -> Result<Arc<dyn ObjectStore<Secret>>, ApplyError> {
        let live = self.kube_store::<Secret>()?;
        match self.caches.as_ref().and_then(|c| c.secrets.clone()) {
            Some(cache) => Ok(Arc::new(CachedStore::new(cache, live))),
            None => Ok(live),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kapply_kubehub::MemoryCluster;

    #[test]
    fn missing_handles_are_named() {
        let empty = ClientHolder::new();
        let err = empty.config_maps_store().err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("missing kubeClient"));

        let core_only = ClientHolder::kubernetes(MemoryCluster::new());
        assert!(core_only.secrets_store().is_ok());
        let err = core_only.api_extensions_store::<CustomResourceDefinition>().err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("missing apiExtensionsClient"));
    }
}
