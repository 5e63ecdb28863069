use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum DiaryError {
    /// Represents a failure of the remote store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Represents a failure to read or write the local cache.
    #[error("could not access local cache at {path}")]
    CacheIo { path: String, source: std::io::Error },

    /// Represents a local cache whose contents could not be parsed.
    #[error("local cache is corrupt")]
    CacheCorrupt { source: serde_json::Error },

    /// Represents an entry submitted without a required field.
    #[error("missing required field {field}")]
    MissingField { field: &'static str },

    /// Represents an attempt to create an entry whose ID is already taken.
    #[error("entry {id} already exists")]
    DuplicateEntry { id: String },

    /// Represents a reference to an entry that is not in the diary.
    #[error("entry {id} does not exist")]
    UnknownEntry { id: String },

    /// Represents a request that asks for remote sync while it is switched off.
    #[error("remote sync is disabled")]
    SyncDisabled,

    /// Represents an error with the request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Enumerates errors returned by the remote store subsystem.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Represents a credential or identifier that was never provided.
    #[error("missing configuration: {name} must be set")]
    MissingConfiguration { name: &'static str },

    /// Represents a configuration value that could not be parsed.
    #[error("invalid configuration value for {name}")]
    InvalidConfiguration { name: &'static str },

    /// Represents a request that never got an answer.
    #[error("could not reach remote store")]
    Transport { source: reqwest::Error },

    /// Represents a failure to sign the service-account assertion.
    #[error("could not authenticate with remote store")]
    Authentication { source: jsonwebtoken::errors::Error },

    /// Represents a request the remote store answered with an error status.
    #[error("remote store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Represents a successful response whose body could not be understood.
    #[error("could not parse remote store response")]
    MalformedResponse { source: reqwest::Error },

    /// Represents a URL that cannot carry the requested path.
    #[error("cannot build request URL from {url}")]
    MalformedUrl { url: String },

    /// Represents an ID with no matching row.
    #[error("entry {id} not found in remote store")]
    NotFound { id: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether the remote store refused access, as opposed to being unreachable.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            StoreError::Rejected { status, message } => {
                *status == 401 || *status == 403 || message.to_lowercase().contains("permission")
            }
            _ => false,
        }
    }
}
