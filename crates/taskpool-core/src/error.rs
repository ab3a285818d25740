use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidLocation,
    SnapshotParseError,
    ScriptParseError,
    InvalidResourceTransition,
    RedirectLimitReached,
    SessionExpired,
    Forbidden,
    NetworkOrServer,
    SimulationFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidLocation => "E1002",
            Self::SnapshotParseError => "E1003",
            Self::ScriptParseError => "E1004",
            Self::InvalidResourceTransition => "E2001",
            Self::RedirectLimitReached => "E2002",
            Self::SessionExpired => "E3001",
            Self::Forbidden => "E3002",
            Self::NetworkOrServer => "E3003",
            Self::SimulationFailed => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidLocation => "Location could not be parsed",
            Self::SnapshotParseError => "Snapshot file parse error",
            Self::ScriptParseError => "Replay script parse error",
            Self::InvalidResourceTransition => "Invalid resource transition",
            Self::RedirectLimitReached => "Redirect limit reached",
            Self::SessionExpired => "Session expired",
            Self::Forbidden => "Forbidden",
            Self::NetworkOrServer => "Network or server error",
            Self::SimulationFailed => "Simulation invariant violated",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in taskpool.toml and retry."),
            Self::InvalidLocation => Some("Pass a path such as `/app/pool?project=3`."),
            Self::SnapshotParseError | Self::ScriptParseError => {
                Some("Check the JSON against the documented schema.")
            }
            Self::InvalidResourceTransition => {
                Some("Follow valid transitions: not-asked -> loading -> loaded|failed.")
            }
            Self::RedirectLimitReached => {
                Some("Two routes redirect to each other; check the section access rules.")
            }
            Self::SessionExpired => Some("Log in again."),
            Self::Forbidden => Some("Ask an admin for access to this project."),
            Self::NetworkOrServer => Some("Retry once the backend is reachable."),
            Self::SimulationFailed => Some("Replay the first failing seed with `tp sim --replay`."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How the core reacts to a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Status 401: handled centrally by resetting to the login route.
    AuthRequired,
    /// Status 403: non-fatal, surfaced as a toast.
    Forbidden,
    /// Everything else, surfaced as `Resource::Failed`.
    NetworkOrServer,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::AuthRequired => ErrorCode::SessionExpired,
            Self::Forbidden => ErrorCode::Forbidden,
            Self::NetworkOrServer => ErrorCode::NetworkOrServer,
        }
    }
}

/// Error carried by every external fetch.
///
/// `status` is HTTP-like; `0` means the request never reached the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("api error {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Transport failure before any status was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self.status {
            401 => ErrorKind::AuthRequired,
            403 => ErrorKind::Forbidden,
            _ => ErrorKind::NetworkOrServer,
        }
    }

    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthRequired)
    }

    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self.kind(), ErrorKind::Forbidden)
    }
}
