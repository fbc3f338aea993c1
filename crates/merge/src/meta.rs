use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

/// A required label/annotation key (or owner reference uid) ending in this suffix asks for removal.
pub const REMOVAL_SUFFIX: char = '-';

/// Merge `required` into `existing`, setting `modified` when anything changed.
///
/// Name and namespace follow `required` when it sets them. Labels, annotations and
/// owner references are merged key by key: required entries are forced, entries only
/// present on `existing` survive.
pub fn ensure_object_meta(modified: &mut bool, existing: &mut ObjectMeta, required: &ObjectMeta) {
    set_string_if_set(modified, &mut existing.namespace, required.namespace.as_deref());
    set_string_if_set(modified, &mut existing.name, required.name.as_deref());
    merge_map(modified, &mut existing.labels, required.labels.as_ref());
    merge_map(modified, &mut existing.annotations, required.annotations.as_ref());
    merge_owner_refs(modified, &mut existing.owner_references, required.owner_references.as_deref());
}

pub fn set_string_if_set(modified: &mut bool, existing: &mut Option<String>, required: Option<&str>) {
    let Some(required) = required.filter(|s| !s.is_empty()) else { return };
    if existing.as_deref() != Some(required) {
        *existing = Some(required.to_string());
        *modified = true;
    }
}

pub fn merge_map(
    modified: &mut bool,
    existing: &mut Option<BTreeMap<String, String>>,
    required: Option<&BTreeMap<String, String>>,
) {
    let Some(required) = required else { return };
    for (k, v) in required {
        if let Some(actual) = removal_target(k) {
            if let Some(map) = existing.as_mut() {
                if map.remove(actual).is_some() {
                    *modified = true;
                }
            }
            continue;
        }
        let map = existing.get_or_insert_with(BTreeMap::new);
        if map.get(k) != Some(v) {
            map.insert(k.clone(), v.clone());
            *modified = true;
        }
    }
}

pub fn merge_owner_refs(
    modified: &mut bool,
    existing: &mut Option<Vec<OwnerReference>>,
    required: Option<&[OwnerReference]>,
) {
    let Some(required) = required else { return };
    for req in required {
        let remove = req.uid.ends_with(REMOVAL_SUFFIX);
        let mut want = req.clone();
        want.uid = req.uid.trim_end_matches(REMOVAL_SUFFIX).to_string();

        let found = existing.as_ref().and_then(|refs| refs.iter().position(|r| owner_ref_matches(r, &want)));
        match (found, existing.as_mut()) {
            (Some(idx), Some(refs)) if remove => {
                refs.remove(idx);
                *modified = true;
            }
            (Some(idx), Some(refs)) => {
                if refs[idx] != want {
                    refs[idx] = want;
                    *modified = true;
                }
            }
            // nothing to remove; an absent list stays absent
            _ if remove => {}
            _ => {
                existing.get_or_insert_with(Vec::new).push(want);
                *modified = true;
            }
        }
    }
}

/// Prepare an object's metadata for creation: drop server-owned fields and removal markers.
pub fn with_clean_metadata(meta: &mut ObjectMeta) {
    meta.resource_version = None;
    meta.uid = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.generation = None;
    meta.self_link = None;
    meta.managed_fields = None;
    for map in [meta.labels.as_mut(), meta.annotations.as_mut()].into_iter().flatten() {
        map.retain(|k, _| !k.ends_with(REMOVAL_SUFFIX));
    }
}

fn removal_target(key: &str) -> Option<&str> {
    key.strip_suffix(REMOVAL_SUFFIX).map(|k| k.trim_end_matches(REMOVAL_SUFFIX))
}

fn owner_ref_matches(existing: &OwnerReference, required: &OwnerReference) -> bool {
    existing.name == required.name
        && existing.kind == required.kind
        && existing.uid == required.uid
        && api_group(&existing.api_version) == api_group(&required.api_version)
}

fn api_group(api_version: &str) -> &str {
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}
