//! The get → merge → create-or-update decision.

use std::time::Instant;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kapply_core::{ApplyError, ObjectKey, Recorder, StoreError};
use kapply_merge::{changes, ensure_object_meta, summarize, with_clean_metadata};
use metrics::{counter, histogram};
use tracing::{debug, Level};

use crate::adapter::ApplyAdapter;

/// Stored object after an apply, and whether a write happened.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub object: T,
    pub changed: bool,
}

/// Create `required` if it is missing, update it if it differs, otherwise leave it alone.
///
/// Labels, annotations and owner references present only on the stored object do not
/// count as differences. When an update is needed the payload is `required` itself,
/// not the merged copy. No retries: read and write failures are returned as-is, and a
/// failed create never turns into an update (or the reverse).
pub async fn generic_apply<A: ApplyAdapter>(
    recorder: &dyn Recorder,
    required: &A::Object,
    adapter: &A,
) -> Result<Applied<A::Object>, ApplyError> {
    let t0 = Instant::now();
    let kind = adapter.kind().to_string();
    let key = key_of(adapter.object_meta(required));

    let existing = match adapter.get(required).await {
        Ok(obj) => obj,
        Err(e) if e.is_not_found() => {
            let mut required_copy = adapter.deep_copy(required);
            with_clean_metadata(adapter.object_meta_mut(&mut required_copy));
            let res = adapter.create(&required_copy).await;
            report_create_event(recorder, &kind, &key, res.as_ref().err());
            observe(&kind, if res.is_ok() { "apply_created_total" } else { "apply_err_total" }, t0);
            return match res {
                Ok(object) => Ok(Applied { object, changed: true }),
                Err(source) => Err(ApplyError::Create { kind, name: key.to_string(), source }),
            };
        }
        Err(source) => {
            observe(&kind, "apply_err_total", t0);
            return Err(ApplyError::Read { kind, name: key.to_string(), source });
        }
    };

    let mut modified = false;
    let mut existing_copy = adapter.deep_copy(&existing);
    ensure_object_meta(&mut modified, adapter.object_meta_mut(&mut existing_copy), adapter.object_meta(required));

    let content_same = adapter.deep_equal(required, &existing_copy);
    if content_same && !modified {
        observe(&kind, "apply_noop_total", t0);
        return Ok(Applied { object: existing_copy, changed: false });
    }

    if tracing::enabled!(Level::DEBUG) {
        let before = serde_json::to_value(&existing).unwrap_or_default();
        let after = serde_json::to_value(&existing_copy).unwrap_or_default();
        let changes = changes(&before, &after);
        debug!(kind = %kind, name = %key, content_same, summary = %summarize(&changes), changes = ?changes, "apply changes");
    }

    let res = adapter.update(required).await;
    report_update_event(recorder, &kind, &key, res.as_ref().err());
    observe(&kind, if res.is_ok() { "apply_updated_total" } else { "apply_err_total" }, t0);
    match res {
        Ok(object) => Ok(Applied { object, changed: true }),
        Err(source) => Err(ApplyError::Update { kind, name: key.to_string(), source }),
    }
}

fn key_of(meta: &ObjectMeta) -> ObjectKey {
    ObjectKey::new(meta.namespace.as_deref(), meta.name.as_deref().unwrap_or_default())
}

fn observe(kind: &str, outcome: &'static str, t0: Instant) {
    counter!(outcome, 1u64, "kind" => kind.to_string());
    histogram!("apply_latency_ms", t0.elapsed().as_secs_f64() * 1000.0, "kind" => kind.to_string());
}

/// `configmap/name -n ns`, the way kubectl prints a resource.
fn describe(kind: &str, key: &ObjectKey) -> String {
    let mut s = format!("{}/{}", kind.to_lowercase(), key.name);
    if let Some(ns) = &key.namespace {
        s.push_str(" -n ");
        s.push_str(ns);
    }
    s
}

fn report_create_event(recorder: &dyn Recorder, kind: &str, key: &ObjectKey, err: Option<&StoreError>) {
    match err {
        None => recorder.event(
            &format!("{}Created", kind),
            &format!("Created {} because it was missing", describe(kind, key)),
        ),
        Some(e) => recorder.warning(
            &format!("{}CreateFailed", kind),
            &format!("Failed to create {}: {}", describe(kind, key), e),
        ),
    }
}

fn report_update_event(recorder: &dyn Recorder, kind: &str, key: &ObjectKey, err: Option<&StoreError>) {
    match err {
        None => recorder.event(
            &format!("{}Updated", kind),
            &format!("Updated {} because it changed", describe(kind, key)),
        ),
        Some(e) => recorder.warning(
            &format!("{}UpdateFailed", kind),
            &format!("Failed to update {}: {}", describe(kind, key), e),
        ),
    }
}
