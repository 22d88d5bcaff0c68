//! Error types for lock operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Canonical wire text for [`LockError::ShouldWait`].
pub const SHOULD_WAIT_MESSAGE: &str = "should wait";
/// Canonical wire text for [`LockError::LockAlreadyLeased`].
pub const LOCK_ALREADY_LEASED_MESSAGE: &str = "lock already leased";
/// Canonical wire text for [`LockError::NoExistingLockLeaseFound`].
pub const NO_EXISTING_LOCK_LEASE_FOUND_MESSAGE: &str = "no existing lock lease found";
/// Canonical wire text for [`LockError::RecordVersionChanged`].
pub const RECORD_VERSION_CHANGED_MESSAGE: &str = "record version changed";

/// Errors that can occur during lock operations.
///
/// The first four variants render to fixed canonical texts so they survive
/// a round-trip through the HTTP transport; [`LockError::from_message`]
/// reconstructs them on the receiving side.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock is held by someone else; the caller should poll again.
    ///
    /// Internal to the acquisition loop: blocking acquires retry on it and
    /// non-blocking acquires translate it into a miss, so it never reaches
    /// the end user.
    #[error("should wait")]
    ShouldWait,

    /// The stored lease belongs to a different handle.
    #[error("lock already leased")]
    LockAlreadyLeased,

    /// No lease record exists for the lock.
    #[error("no existing lock lease found")]
    NoExistingLockLeaseFound,

    /// Optimistic-locking conflict: the store record changed between the
    /// read and the versioned write. Consumed by the backend's retry loop.
    #[error("record version changed")]
    RecordVersionChanged,

    /// Blocking acquisition exceeded its deadline.
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// Release was called with a handle the lock manager never issued
    /// (or has already released).
    #[error("unknown id {id} for lock {name:?}")]
    UnknownHandle {
        /// The handle id passed to release.
        id: Uuid,
        /// The lock name recorded in the handle.
        name: String,
    },

    /// The lock name cannot be used (e.g. empty).
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// Filesystem error from the file-lock engine.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Lease record failed to encode or decode.
    #[error("lease record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// HTTP transport failure (connection, status, body decode).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Store- or backend-specific error, surfaced unchanged.
    #[error("{0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

impl LockError {
    /// Reconstructs a typed error from a wire message.
    ///
    /// The canonical texts map back to their variants; anything else
    /// becomes an opaque [`LockError::Backend`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match message.as_str() {
            SHOULD_WAIT_MESSAGE => LockError::ShouldWait,
            LOCK_ALREADY_LEASED_MESSAGE => LockError::LockAlreadyLeased,
            NO_EXISTING_LOCK_LEASE_FOUND_MESSAGE => LockError::NoExistingLockLeaseFound,
            RECORD_VERSION_CHANGED_MESSAGE => LockError::RecordVersionChanged,
            _ => LockError::Backend(message.into()),
        }
    }

    pub fn is_should_wait(&self) -> bool {
        matches!(self, LockError::ShouldWait)
    }

    pub fn is_lock_already_leased(&self) -> bool {
        matches!(self, LockError::LockAlreadyLeased)
    }

    pub fn is_no_existing_lock_lease_found(&self) -> bool {
        matches!(self, LockError::NoExistingLockLeaseFound)
    }

    pub fn is_record_version_changed(&self) -> bool {
        matches!(self, LockError::RecordVersionChanged)
    }

    /// True for the two classes that mean the caller's lease no longer
    /// exists under its id: the lease rotated to another holder or the
    /// record is gone entirely.
    pub fn is_lease_lost(&self) -> bool {
        matches!(
            self,
            LockError::LockAlreadyLeased | LockError::NoExistingLockLeaseFound
        )
    }
}

/// Error carried across the wire as a plain string.
///
/// Serializes to the error's `Display` text, or to the empty string when
/// there is no error. The receiving side recovers the typed variant with
/// [`LockError::from_message`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializableError(String);

impl SerializableError {
    /// The "no error" value (empty message).
    pub fn none() -> Self {
        Self(String::new())
    }

    /// Converts back into a typed error, or `None` when the message is empty.
    pub fn into_error(self) -> Option<LockError> {
        if self.0.is_empty() {
            None
        } else {
            Some(LockError::from_message(self.0))
        }
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<&LockError> for SerializableError {
    fn from(err: &LockError) -> Self {
        Self(err.to_string())
    }
}

impl<T> From<&LockResult<T>> for SerializableError {
    fn from(result: &LockResult<T>) -> Self {
        match result {
            Ok(_) => Self::none(),
            Err(err) => err.into(),
        }
    }
}
