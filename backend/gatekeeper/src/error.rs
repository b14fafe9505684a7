use thiserror::Error;

/// Errors raised by the durable response store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("response store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("response store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The user already has a record. The flow re-checks before writing, so
    /// reaching this means two commits slipped past each other.
    #[error("user {0} already has a recorded attempt")]
    DuplicateAttempt(String),
}

/// Errors returned by the chat platform adapter.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl PlatformError {
    /// Whether repeating the same idempotent request may succeed.
    ///
    /// 404 counts: an `@original` edit can race the deferred response that
    /// creates the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PlatformError::Status { status, .. } => {
                *status == 404 || *status == 429 || *status >= 500
            }
        }
    }
}

/// Everything that can end a verification attempt early.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("user already completed verification")]
    AlreadyAttempted,

    #[error("another attempt for this user was committed first")]
    AlreadyAttemptedRace,

    #[error("duplicate attempt reached the store: {0}")]
    DuplicateAttempt(String),

    #[error("attempt recorded but granting the capability failed: {0}")]
    CapabilityGrantFailed(#[source] PlatformError),

    #[error("platform error: {0}")]
    TransientPlatform(#[from] PlatformError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAttempt(user) => FlowError::DuplicateAttempt(user),
            other => FlowError::Store(other),
        }
    }
}
