//! Closed set of decodable kinds: manifest bytes in, typed object out.

use std::any::Any;
use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kapply_core::env_usize;
use kapply_kubehub::{gvk_key, KubeObject};
use kube::core::GroupVersionKind;
use serde_json::Value as Json;

/// A typed object behind a type-erased box, tagged with its kind.
pub struct Decoded {
    pub gvk: GroupVersionKind,
    /// Kind tag, e.g. `v1/ConfigMap`.
    pub type_name: String,
    pub name: String,
    pub namespace: Option<String>,
    pub object: Box<dyn Any + Send>,
}

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoded")
            .field("type_name", &self.type_name)
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("manifest too large (>{0} bytes)")]
    TooLarge(usize),
    #[error("manifest too complex (>{0} nodes)")]
    TooComplex(usize),
    #[error("parsing YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("converting YAML to JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest missing {0}")]
    Missing(&'static str),
    #[error("no kind {kind:?} is registered for version {api_version:?}")]
    NotRegistered { api_version: String, kind: String },
    #[error("decoding {type_name}: {source}")]
    Object { type_name: String, #[source] source: serde_json::Error },
}

/// Size budgets for a single manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestLimits {
    pub max_bytes: usize,
    pub max_nodes: usize,
}

impl Default for ManifestLimits {
    fn default() -> Self { Self { max_bytes: 1_000_000, max_nodes: 100_000 } }
}

impl ManifestLimits {
    /// `KAPPLY_MAX_MANIFEST_BYTES` / `KAPPLY_MAX_MANIFEST_NODES`, defaulting to 1 MiB / 100k nodes.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_bytes: env_usize("KAPPLY_MAX_MANIFEST_BYTES", d.max_bytes),
            max_nodes: env_usize("KAPPLY_MAX_MANIFEST_NODES", d.max_nodes),
        }
    }
}

type DecodeFn = fn(Json) -> Result<Box<dyn Any + Send>, serde_json::Error>;

fn decode_as<K: KubeObject>(v: Json) -> Result<Box<dyn Any + Send>, serde_json::Error> {
    let obj: K = serde_json::from_value(v)?;
    Ok(Box::new(obj))
}

struct Registration {
    type_name: String,
    decode: DecodeFn,
}

/// Immutable decoding scheme, built once and passed to whoever decodes.
pub struct Scheme {
    kinds: BTreeMap<(String, String), Registration>,
    limits: ManifestLimits,
}

pub struct SchemeBuilder {
    kinds: BTreeMap<(String, String), Registration>,
    limits: ManifestLimits,
}

impl SchemeBuilder {
    pub fn register<K: KubeObject>(mut self) -> Self {
        let key = (K::api_version(&()).into_owned(), K::kind(&()).into_owned());
        self.kinds.insert(key, Registration { type_name: gvk_key::<K>(), decode: decode_as::<K> });
        self
    }

    pub fn limits(mut self, limits: ManifestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Scheme { Scheme { kinds: self.kinds, limits: self.limits } }
}

impl Scheme {
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder { kinds: BTreeMap::new(), limits: ManifestLimits::default() }
    }

    /// Core, RBAC, storage and apiextensions kinds, plus common workload kinds.
    pub fn standard() -> Self {
        Self::builder()
            .register::<Namespace>()
            .register::<Service>()
            .register::<Pod>()
            .register::<ServiceAccount>()
            .register::<ConfigMap>()
            .register::<Secret>()
            .register::<ClusterRole>()
            .register::<ClusterRoleBinding>()
            .register::<Role>()
            .register::<RoleBinding>()
            .register::<CustomResourceDefinition>()
            .register::<StorageClass>()
            .register::<CSIDriver>()
            .register::<Deployment>()
            .register::<DaemonSet>()
            .register::<StatefulSet>()
            .register::<Job>()
            .limits(ManifestLimits::from_env())
            .build()
    }

    pub fn limits(&self) -> ManifestLimits { self.limits }

    /// Kind tags this scheme can decode, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.kinds.values().map(|r| r.type_name.as_str()).collect();
        out.sort_unstable();
        out
    }

    pub fn recognizes(&self, api_version: &str, kind: &str) -> bool {
        self.kinds.contains_key(&(api_version.to_string(), kind.to_string()))
    }

    /// Decode one YAML or JSON document into its registered typed object.
    pub fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        if bytes.len() > self.limits.max_bytes {
            return Err(DecodeError::TooLarge(self.limits.max_bytes));
        }
        let val: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        let json = serde_json::to_value(val)?;
        if json_node_budget_exceeded(&json, self.limits.max_nodes) {
            return Err(DecodeError::TooComplex(self.limits.max_nodes));
        }
        let api_version = json.get("apiVersion").and_then(|v| v.as_str()).ok_or(DecodeError::Missing("apiVersion"))?.to_string();
        let kind = json.get("kind").and_then(|v| v.as_str()).ok_or(DecodeError::Missing("kind"))?.to_string();
        let meta = json.get("metadata");
        let name = meta.and_then(|m| m.get("name")).and_then(|v| v.as_str()).ok_or(DecodeError::Missing("metadata.name"))?.to_string();
        let namespace = meta.and_then(|m| m.get("namespace")).and_then(|v| v.as_str()).map(|s| s.to_string());

        let reg = self
            .kinds
            .get(&(api_version.clone(), kind.clone()))
            .ok_or_else(|| DecodeError::NotRegistered { api_version: api_version.clone(), kind: kind.clone() })?;
        let object = (reg.decode)(json).map_err(|source| DecodeError::Object { type_name: reg.type_name.clone(), source })?;

        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version),
        };
        Ok(Decoded {
            gvk: GroupVersionKind { group, version, kind },
            type_name: reg.type_name.clone(),
            name,
            namespace,
            object,
        })
    }
}

fn json_node_budget_exceeded(v: &Json, max: usize) -> bool {
    // keep a running counter and bail early when exceeding max
    fn walk(v: &Json, cur: &mut usize, max: usize) {
        if *cur >= max { return; }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for (_k, vv) in map.iter() {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            Json::Array(arr) => {
                for vv in arr.iter() {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max);
    count >= max
}

#[cfg(test)]
mod tests {
    use super::*;

    const CM: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n  namespace: ns\ndata:\n  k: v\n";

    fn scheme() -> Scheme {
        Scheme::builder().register::<ConfigMap>().register::<ClusterRole>().build()
    }

    #[test]
    fn decodes_typed_objects() {
        let d = scheme().decode(CM.as_bytes()).unwrap();
        assert_eq!(d.type_name, "v1/ConfigMap");
        assert_eq!(d.gvk.group, "");
        assert_eq!(d.namespace.as_deref(), Some("ns"));
        let cm = d.object.downcast::<ConfigMap>().unwrap();
        assert_eq!(cm.data.unwrap()["k"], "v");

        let json = br#"{"apiVersion":"rbac.authorization.k8s.io/v1","kind":"ClusterRole","metadata":{"name":"r"}}"#;
        let d = scheme().decode(json).unwrap();
        assert_eq!(d.type_name, "rbac.authorization.k8s.io/v1/ClusterRole");
        assert_eq!(d.gvk.group, "rbac.authorization.k8s.io");
        assert_eq!(d.gvk.version, "v1");
    }

    #[test]
    fn decode_errors_are_friendly() {
        let s = scheme();
        let e1 = s.decode(b"kind: Foo\nmetadata:\n  name: x\n").unwrap_err().to_string();
        assert!(e1.contains("missing apiVersion"), "e1={}", e1);
        let e2 = s.decode(b"apiVersion: v1\nmetadata:\n  name: x\n").unwrap_err().to_string();
        assert!(e2.contains("missing kind"), "e2={}", e2);
        let e3 = s.decode(b"apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n").unwrap_err().to_string();
        assert!(e3.contains("missing metadata.name"), "e3={}", e3);
        let e4 = s.decode(b"apiVersion: v1\nkind: Widget\nmetadata:\n  name: x\n").unwrap_err();
        assert!(matches!(e4, DecodeError::NotRegistered { .. }));
        let e5 = s.decode(b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\ndata: [1, 2]\n").unwrap_err();
        assert!(matches!(e5, DecodeError::Object { .. }), "e5={}", e5);
        assert!(matches!(s.decode(b": : :\n  - ["), Err(DecodeError::Yaml(_))));
    }

    #[test]
    fn limits_are_enforced() {
        let tiny = Scheme::builder()
            .register::<ConfigMap>()
            .limits(ManifestLimits { max_bytes: 16, max_nodes: 100 })
            .build();
        assert!(matches!(tiny.decode(CM.as_bytes()), Err(DecodeError::TooLarge(16))));

        let shallow = Scheme::builder()
            .register::<ConfigMap>()
            .limits(ManifestLimits { max_bytes: 1 << 20, max_nodes: 4 })
            .build();
        assert!(matches!(shallow.decode(CM.as_bytes()), Err(DecodeError::TooComplex(4))));
    }

    #[test]
    fn standard_scheme_lists_kinds() {
        let s = Scheme::standard();
        assert!(s.recognizes("apps/v1", "Deployment"));
        assert!(s.recognizes("apiextensions.k8s.io/v1", "CustomResourceDefinition"));
        assert!(!s.recognizes("apiextensions.k8s.io/v1beta1", "CustomResourceDefinition"));
        assert_eq!(s.type_names().len(), 17);
    }
}
