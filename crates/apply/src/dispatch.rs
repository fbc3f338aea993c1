//! Manifest identifiers in, one [`ApplyResult`] per identifier out.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kapply_core::{ApplyError, ApplyResult, ManifestSource, ObjectStore, Recorder};
use kapply_kubehub::{gvk_key, KubeObject};
use serde_json::Value as Json;
use tracing::{debug, info, warn};

use crate::adapter::KubeAdapter;
use crate::clients::ClientHolder;
use crate::engine::{generic_apply, Applied};
use crate::kinds::Content;
use crate::scheme::Scheme;

type StoreFn<K> = fn(&ClientHolder) -> Result<Arc<dyn ObjectStore<K>>, ApplyError>;

#[async_trait::async_trait]
trait Route: Send + Sync {
    async fn apply(
        &self,
        clients: &ClientHolder,
        recorder: &dyn Recorder,
        object: Box<dyn Any + Send>,
    ) -> Result<Applied<Json>, ApplyError>;
}

struct TypedRoute<K> {
    store: StoreFn<K>,
}

#[async_trait::async_trait]
impl<K: KubeObject + Content> Route for TypedRoute<K> {
    async fn apply(
        &self,
        clients: &ClientHolder,
        recorder: &dyn Recorder,
        object: Box<dyn Any + Send>,
    ) -> Result<Applied<Json>, ApplyError> {
        let required = object.downcast::<K>().map_err(|_| ApplyError::UnsupportedKind(gvk_key::<K>()))?;
        let adapter = KubeAdapter::new((self.store)(clients)?);
        let applied = generic_apply(recorder, required.as_ref(), &adapter).await?;
        Ok(Applied { object: serde_json::to_value(&applied.object)?, changed: applied.changed })
    }
}

/// Kind tag to apply route. Kinds without a route decode fine but are not applied.
#[derive(Default)]
pub struct Registry {
    routes: BTreeMap<String, Box<dyn Route>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Route `K` through the store `store` resolves from the client holder.
    pub fn register<K: KubeObject + Content>(mut self, store: StoreFn<K>) -> Self {
        self.routes.insert(gvk_key::<K>(), Box::new(TypedRoute::<K> { store }));
        self
    }

    pub fn standard() -> Self {
        Self::new()
            .register::<Namespace>(ClientHolder::kube_store::<Namespace>)
            .register::<Service>(ClientHolder::kube_store::<Service>)
            .register::<Pod>(ClientHolder::kube_store::<Pod>)
            .register::<ServiceAccount>(ClientHolder::kube_store::<ServiceAccount>)
            .register::<ConfigMap>(ClientHolder::config_maps_store)
            .register::<Secret>(ClientHolder::secrets_store)
            .register::<ClusterRole>(ClientHolder::kube_store::<ClusterRole>)
            .register::<ClusterRoleBinding>(ClientHolder::kube_store::<ClusterRoleBinding>)
            .register::<Role>(ClientHolder::kube_store::<Role>)
            .register::<RoleBinding>(ClientHolder::kube_store::<RoleBinding>)
            .register::<CustomResourceDefinition>(ClientHolder::api_extensions_store::<CustomResourceDefinition>)
            .register::<StorageClass>(ClientHolder::kube_store::<StorageClass>)
            .register::<CSIDriver>(ClientHolder::kube_store::<CSIDriver>)
    }

    pub fn handles(&self, type_name: &str) -> bool { self.routes.contains_key(type_name) }

    pub fn type_names(&self) -> impl Iterator<Item = &str> { self.routes.keys().map(|k| k.as_str()) }
}

/// Apply each manifest in `files`, strictly one after another and in order.
///
/// Failures stay local to their file: every identifier gets exactly one result.
pub async fn apply_directly(
    clients: &ClientHolder,
    recorder: &dyn Recorder,
    scheme: &Scheme,
    registry: &Registry,
    manifests: &dyn ManifestSource,
    files: &[&str],
) -> Vec<ApplyResult> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        out.push(apply_file(clients, recorder, scheme, registry, manifests, file).await);
    }
    out
}

async fn apply_file(
    clients: &ClientHolder,
    recorder: &dyn Recorder,
    scheme: &Scheme,
    registry: &Registry,
    manifests: &dyn ManifestSource,
    file: &str,
) -> ApplyResult {
    let mut result = ApplyResult::new(file);

    let bytes = match manifests.read(file) {
        Ok(b) => b,
        Err(e) => {
            warn!(file, error = %format!("{:#}", e), "manifest unreadable");
            result.error = Some(ApplyError::MissingManifest { file: file.to_string(), reason: format!("{:#}", e) });
            return result;
        }
    };

    let decoded = match scheme.decode(&bytes) {
        Ok(d) => d,
        Err(e) => {
            warn!(file, error = %e, "manifest undecodable");
            result.error = Some(ApplyError::Decode { file: file.to_string(), reason: e.to_string() });
            return result;
        }
    };
    result.kind = decoded.type_name.clone();
    debug!(file, kind = %decoded.type_name, ns = ?decoded.namespace, name = %decoded.name, "decoded");

    let Some(route) = registry.routes.get(&decoded.type_name) else {
        warn!(file, kind = %decoded.type_name, "no apply route");
        result.error = Some(ApplyError::UnsupportedKind(decoded.type_name));
        return result;
    };

    match route.apply(clients, recorder, decoded.object).await {
        Ok(applied) => {
            info!(file, kind = %result.kind, changed = applied.changed, "applied");
            result.result = Some(applied.object);
            result.changed = applied.changed;
        }
        Err(e) => {
            warn!(file, kind = %result.kind, error = %e, "apply failed");
            result.changed = e.write_attempted();
            result.error = Some(e);
        }
    }
    result
}

/// A scheme and registry bundled for repeated batches.
pub struct Dispatcher {
    scheme: Scheme,
    registry: Registry,
}

impl Dispatcher {
    pub fn new(scheme: Scheme, registry: Registry) -> Self { Self { scheme, registry } }

    pub fn standard() -> Self { Self::new(Scheme::standard(), Registry::standard()) }

    pub fn scheme(&self) -> &Scheme { &self.scheme }
    pub fn registry(&self) -> &Registry { &self.registry }

    pub async fn apply_all(
        &self,
        clients: &ClientHolder,
        recorder: &dyn Recorder,
        manifests: &dyn ManifestSource,
        files: &[&str],
    ) -> Vec<ApplyResult> {
        apply_directly(clients, recorder, &self.scheme, &self.registry, manifests, files).await
    }

    pub async fn apply_one(
        &self,
        clients: &ClientHolder,
        recorder: &dyn Recorder,
        manifests: &dyn ManifestSource,
        file: &str,
    ) -> ApplyResult {
        apply_file(clients, recorder, &self.scheme, &self.registry, manifests, file).await
    }
}
