//! Error taxonomy shared by stores, the engine and the dispatcher.

/// Failures reported by a backing store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },
    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: String, name: String },
    #[error("invalid object: {0}")]
    Invalid(String),
    #[error("api error {code}: {message}")]
    Api { code: u16, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("codec: {0}")]
    Codec(String),
}

impl StoreError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound { kind: kind.into(), name: name.into() }
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists { kind: kind.into(), name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api { code, .. } => *code == 404,
            _ => false,
        }
    }
}

/// Per-file apply failure. None of these abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// A backing-store handle needed for this kind was never configured.
    #[error("missing {0}")]
    MissingClient(&'static str),
    #[error("missing {file:?}: {reason}")]
    MissingManifest { file: String, reason: String },
    #[error("cannot decode {file:?}: {reason}")]
    Decode { file: String, reason: String },
    #[error("unhandled type {0}")]
    UnsupportedKind(String),
    #[error("failed to get {kind} {name}: {source}")]
    Read { kind: String, name: String, #[source] source: StoreError },
    #[error("failed to create {kind} {name}: {source}")]
    Create { kind: String, name: String, #[source] source: StoreError },
    #[error("failed to update {kind} {name}: {source}")]
    Update { kind: String, name: String, #[source] source: StoreError },
    #[error("cannot encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApplyError {
    /// True when the engine had already committed to a write (create or update) that failed.
    pub fn write_attempted(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Update { .. })
    }

    /// The store error behind a read or write failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Read { source, .. } | Self::Create { source, .. } | Self::Update { source, .. } => Some(source),
            _ => None,
        }
    }
}
