//! kapply merge: ownership-aware metadata merging and change reporting.
//!
//! Keys present in the required metadata win; keys that only exist on the stored
//! object belong to someone else and are left alone.

#![forbid(unsafe_code)]

mod diff;
mod meta;

pub use diff::{changes, strip_noisy, summarize, Change, ChangeOp, ChangeSummary};
pub use meta::{
    ensure_object_meta, merge_map, merge_owner_refs, set_string_if_set, with_clean_metadata,
    REMOVAL_SUFFIX,
};
