//! Error types for the file access adapter.

use thiserror::Error;

use crate::storage::FileStat;

/// Result type for adapter operations.
pub type FsAccessResult<T> = Result<T, FsAccessError>;

/// Result type for calls into host capabilities.
pub type HostResult<T> = Result<T, HostError>;

/// Errors surfaced to the storage registry.
///
/// Conflict and permission failures are separate variants so the calling UI
/// can offer reload, overwrite or re-grant actions.
#[derive(Debug, Error)]
pub enum FsAccessError {
    /// No cached file handle exists for the path.
    #[error("no cached file handle for {path}")]
    NotFound {
        /// Logical id that was looked up.
        path: String,
    },

    /// The user or the host rejected the read/write grant.
    #[error("permission denied for {path}: {reason}")]
    PermissionDenied {
        /// Logical id of the file.
        path: String,
        /// Host-provided detail.
        reason: String,
    },

    /// Reading, writing or reading metadata of the file failed.
    #[error("I/O error during {context}: {reason}")]
    Io {
        /// Operation that failed.
        context: String,
        /// Host-provided detail.
        reason: String,
    },

    /// The file changed since the revision the caller last saw.
    #[error("revision conflict, current rev is {}", current.rev)]
    RevisionConflict {
        /// Stat of the file at the time of the check.
        current: FileStat,
    },

    /// The file picker was dismissed.
    #[error("user cancelled")]
    UserCancelled,

    /// The persistent handle store is unavailable or corrupt.
    #[error("handle cache error: {0}")]
    Cache(String),

    /// The adapter configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl FsAccessError {
    /// Stable machine-readable code for the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Io { .. } => "io",
            Self::RevisionConflict { .. } => "rev_conflict",
            Self::UserCancelled => "user_cancelled",
            Self::Cache(_) => "cache",
            Self::Config(_) => "config",
        }
    }

    /// Returns `true` for an optimistic save that lost the revision check.
    #[must_use]
    pub const fn is_rev_conflict(&self) -> bool {
        matches!(self, Self::RevisionConflict { .. })
    }

    /// The current stat carried by a revision conflict.
    #[must_use]
    pub const fn conflict_stat(&self) -> Option<&FileStat> {
        match self {
            Self::RevisionConflict { current } => Some(current),
            _ => None,
        }
    }

    pub(crate) fn not_found(path: &str) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn permission_denied(path: &str, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Maps a failed host call made while touching `path`.
    ///
    /// Host security rejections become [`Self::PermissionDenied`]; everything
    /// else is an I/O failure.
    pub(crate) fn from_host(path: &str, context: &str, error: HostError) -> Self {
        match error.kind {
            HostErrorKind::NotAllowed | HostErrorKind::Security => {
                Self::permission_denied(path, error.message)
            }
            _ => Self::Io {
                context: format!("{context} {path}"),
                reason: error.to_string(),
            },
        }
    }
}

/// Failure category reported by the host, modelled on `DOMException` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    /// `NotAllowedError`: the user or policy refused the request.
    NotAllowed,
    /// `SecurityError`: the call is not allowed in this context.
    Security,
    /// `AbortError`: the user dismissed a prompt or picker.
    Abort,
    /// `NotFoundError`: the underlying entry no longer exists.
    NotFound,
    /// `InvalidStateError`: the handle or stream is in an unusable state.
    InvalidState,
    /// Any other failure.
    Other,
}

impl HostErrorKind {
    /// Classifies a `DOMException` name.
    #[must_use]
    pub fn from_dom_name(name: &str) -> Self {
        match name {
            "NotAllowedError" => Self::NotAllowed,
            "SecurityError" => Self::Security,
            "AbortError" => Self::Abort,
            "NotFoundError" => Self::NotFound,
            "InvalidStateError" => Self::InvalidState,
            _ => Self::Other,
        }
    }
}

/// An error returned by a host capability call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct HostError {
    /// Failure category.
    pub kind: HostErrorKind,
    /// Host-provided message.
    pub message: String,
}

impl HostError {
    /// Creates a host error of the given kind.
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
