//! Change reporting between a stored object and its merged copy.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp { Add, Replace, Remove }

/// One JSON-pointer addressed difference, JSON-patch style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub op: ChangeOp,
    pub path: String,
}

/// Drop fields the server owns so they never show up as changes.
pub fn strip_noisy(mut v: Json) -> Json {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
            obj.remove("resourceVersion");
            obj.remove("generation");
            obj.remove("creationTimestamp");
        }
    }
    // Status is server-populated; ignore it during diffs
    if let Some(obj) = v.as_object_mut() { obj.remove("status"); }
    v
}

/// Paths that differ going from `before` to `after`. Arrays are compared as a whole.
pub fn changes(before: &Json, after: &Json) -> Vec<Change> {
    fn walk(path: &mut String, a: &Json, b: &Json, out: &mut Vec<Change>) {
        match (a, b) {
            (Json::Object(ao), Json::Object(bo)) => {
                for (k, bv) in bo.iter() {
                    let len = path.len();
                    push_segment(path, k);
                    match ao.get(k) {
                        Some(av) if av == bv => {}
                        Some(av) => walk(path, av, bv, out),
                        None => out.push(Change { op: ChangeOp::Add, path: path.clone() }),
                    }
                    path.truncate(len);
                }
                for k in ao.keys().filter(|k| !bo.contains_key(*k)) {
                    let len = path.len();
                    push_segment(path, k);
                    out.push(Change { op: ChangeOp::Remove, path: path.clone() });
                    path.truncate(len);
                }
            }
            (av, bv) => {
                if av != bv {
                    out.push(Change { op: ChangeOp::Replace, path: path.clone() });
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(&mut String::new(), &strip_noisy(before.clone()), &strip_noisy(after.clone()), &mut out);
    out
}

fn push_segment(path: &mut String, key: &str) {
    path.push('/');
    // RFC 6901 escaping
    path.push_str(&key.replace('~', "~0").replace('/', "~1"));
}

/// Per-op counts of a change list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub replaced: usize,
    pub removed: usize,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool { self.added + self.replaced + self.removed == 0 }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{} ~{} -{}", self.added, self.replaced, self.removed)
    }
}

pub fn summarize(changes: &[Change]) -> ChangeSummary {
    changes.iter().fold(ChangeSummary::default(), |mut s, c| {
        match c.op {
            ChangeOp::Add => s.added += 1,
            ChangeOp::Replace => s.replaced += 1,
            ChangeOp::Remove => s.removed += 1,
        }
        s
    })
}
