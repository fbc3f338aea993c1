//! kapply core types: object identity, store contract, apply results.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

pub mod error;
pub mod events;
pub mod manifest;

pub use error::{ApplyError, StoreError};
pub use events::{Event, EventType, MemoryRecorder, NoopRecorder, Recorder, TracingRecorder};
pub use manifest::{DirSource, ManifestSource, MapSource};

/// Namespace/name identity of a stored object. Cluster-scoped objects carry no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(|ns| ns.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: &str) -> Self {
        Self { namespace: None, name: name.to_string() }
    }

    /// Read `metadata.namespace`/`metadata.name` from a raw object.
    pub fn from_raw(raw: &serde_json::Value) -> Option<Self> {
        let meta = raw.get("metadata")?;
        let name = meta.get("name").and_then(|v| v.as_str())?;
        let ns = meta.get("namespace").and_then(|v| v.as_str());
        Some(Self::new(ns, name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeltaKind {
    Applied,
    Deleted,
    /// A full listing of `key.namespace` (every namespace when `None`) has been delivered.
    Synced,
}

/// A change observed by a watcher, destined for a local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub key: ObjectKey,
    pub kind: DeltaKind,
    /// Raw object with managedFields stripped
    pub raw: serde_json::Value,
}

impl Delta {
    /// Marker sent after a complete listing. Its key carries the namespace and an empty name.
    pub fn synced(namespace: Option<&str>) -> Self {
        Self { key: ObjectKey::new(namespace, ""), kind: DeltaKind::Synced, raw: serde_json::Value::Null }
    }
}

/// Backing store for one object kind. Reads may be served from a cache; writes never are.
#[async_trait::async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// Fetch the stored object. Absent objects yield [`StoreError::NotFound`].
    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<K, StoreError>;
    async fn create(&self, obj: &K) -> Result<K, StoreError>;
    /// Unconditional overwrite of the stored object.
    async fn update(&self, obj: &K) -> Result<K, StoreError>;
}

/// Outcome of applying one manifest. Exactly one is produced per requested file.
#[derive(Debug, Serialize)]
pub struct ApplyResult {
    pub file: String,
    /// Kind tag of the decoded object, empty when decoding never happened.
    pub kind: String,
    pub result: Option<serde_json::Value>,
    pub changed: bool,
    #[serde(serialize_with = "error_as_string")]
    pub error: Option<ApplyError>,
}

impl ApplyResult {
    pub fn new(file: &str) -> Self {
        Self { file: file.to_string(), kind: String::new(), result: None, changed: false, error: None }
    }

    pub fn is_ok(&self) -> bool { self.error.is_none() }
}

fn error_as_string<S: Serializer>(err: &Option<ApplyError>, s: S) -> Result<S::Ok, S::Error> {
    match err {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Read a usize knob from the environment, falling back to `default` when unset or malformed.
pub fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}
