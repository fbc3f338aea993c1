//! kapply apply: generic create-or-update engine, per-kind adapters and manifest dispatch.
//!
//! A manifest is decoded through a [`Scheme`], routed by kind tag through a
//! [`Registry`] to a typed [`KubeAdapter`], and converged by [`generic_apply`]:
//! missing objects are created, differing ones updated, equal ones left alone.

#![forbid(unsafe_code)]

mod adapter;
mod clients;
mod dispatch;
mod engine;
mod kinds;
mod scheme;

pub use adapter::{ApplyAdapter, KubeAdapter};
pub use clients::ClientHolder;
pub use dispatch::{apply_directly, Dispatcher, Registry};
pub use engine::{generic_apply, Applied};
pub use kinds::Content;
pub use scheme::{DecodeError, Decoded, ManifestLimits, Scheme, SchemeBuilder};

pub use kapply_core::{ApplyError, ApplyResult};
