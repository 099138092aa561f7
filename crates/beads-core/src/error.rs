use std::fmt;
use std::path::PathBuf;

use crate::lock::LockError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ConfigInvalid,
    ItemNotFound,
    AmbiguousId,
    InvalidInput,
    CycleDetected,
    StateConflict,
    SnapshotWriteFailed,
    SnapshotReadFailed,
    LegacyStatus,
    LockContention,
    IdSpaceExhausted,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::ConfigInvalid => "E1003",
            Self::ItemNotFound => "E2001",
            Self::StateConflict => "E2002",
            Self::CycleDetected => "E2003",
            Self::AmbiguousId => "E2004",
            Self::InvalidInput => "E2005",
            Self::IdSpaceExhausted => "E2006",
            Self::SnapshotReadFailed => "E3001",
            Self::LegacyStatus => "E3002",
            Self::SnapshotWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ConfigInvalid => "Config file rejected",
            Self::ItemNotFound => "Item not found",
            Self::AmbiguousId => "Ambiguous item ID",
            Self::InvalidInput => "Invalid input",
            Self::CycleDetected => "Cycle would be created",
            Self::StateConflict => "Operation conflicts with current state",
            Self::SnapshotWriteFailed => "Snapshot write failed",
            Self::SnapshotReadFailed => "Snapshot read failed",
            Self::LegacyStatus => "Snapshot contains a retired status value",
            Self::LockContention => "Lock contention",
            Self::IdSpaceExhausted => "Could not allocate a unique ID",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in the projects file and retry."),
            Self::ConfigInvalid => {
                Some("Every project needs a unique name, a unique token and a data file.")
            }
            Self::ItemNotFound => None,
            Self::AmbiguousId => Some("Use a longer ID prefix to disambiguate."),
            Self::InvalidInput => None,
            Self::CycleDetected => Some("Remove/adjust dependency links to keep the graph acyclic."),
            Self::StateConflict => None,
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::SnapshotReadFailed => Some("Restore the data file from a backup or fix its JSON."),
            Self::LegacyStatus => {
                Some("Rewrite 'resolved'/'wontfix' statuses to 'closed' before loading.")
            }
            Self::LockContention => {
                Some("Another beads server owns this data file; stop it or pick another file.")
            }
            Self::IdSpaceExhausted => Some("Retry the request."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Coarse error categories surfaced to the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Ambiguous,
    Invalid,
    Conflict,
    Persist,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Ambiguous => "ambiguous",
            Self::Invalid => "invalid",
            Self::Conflict => "conflict",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reading or writing the on-disk snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode snapshot {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bead '{id}' has retired status '{status}'")]
    LegacyStatus { id: String, status: String },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("snapshot sink unavailable: {0}")]
    Unavailable(String),
}

impl PersistError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io { op: "read", .. } | Self::Decode { .. } => ErrorCode::SnapshotReadFailed,
            Self::LegacyStatus { .. } => ErrorCode::LegacyStatus,
            Self::Lock(err) => err.code(),
            Self::Io { .. } | Self::Encode(_) | Self::Unavailable(_) => {
                ErrorCode::SnapshotWriteFailed
            }
        }
    }
}

/// Errors returned by issue store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("item not found: {id}")]
    NotFound { id: String },
    #[error("ambiguous id '{prefix}': matches {}", candidates.join(", "))]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
    #[error("{message}")]
    Invalid { code: ErrorCode, message: String },
    #[error("{0}")]
    Conflict(String),
    #[error("persist failed: {0}")]
    Persist(#[from] PersistError),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::Invalid {
            code: ErrorCode::CycleDetected,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Persist(_) => ErrorKind::Persist,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::Ambiguous { .. } => ErrorCode::AmbiguousId,
            Self::Invalid { code, .. } => *code,
            Self::Conflict(_) => ErrorCode::StateConflict,
            Self::Persist(err) => err.code(),
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
