//! Manifest sources: where raw manifest bytes come from.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

pub trait ManifestSource: Send + Sync {
    fn read(&self, file: &str) -> Result<Vec<u8>>;
}

impl<F> ManifestSource for F
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    fn read(&self, file: &str) -> Result<Vec<u8>> { self(file) }
}

/// Reads files relative to a root directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }
}

impl ManifestSource for DirSource {
    fn read(&self, file: &str) -> Result<Vec<u8>> {
        let path = self.root.join(file);
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}

/// In-memory manifests keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MapSource {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, file: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(file, content);
        self
    }

    pub fn insert(&mut self, file: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(file.to_string(), content.into());
    }
}

impl ManifestSource for MapSource {
    fn read(&self, file: &str) -> Result<Vec<u8>> {
        self.files.get(file).cloned().ok_or_else(|| anyhow!("no such manifest"))
    }
}
