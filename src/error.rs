//! Error taxonomy for ArgoCD operations
//!
//! Every failure coming back from the cluster executor is folded into one of
//! five kinds. Components decide what to do from the kind alone:
//!
//! | Kind         | Retryable | Reads                     | Writes    |
//! |--------------|-----------|---------------------------|-----------|
//! | `Permission` | no        | degrade to empty          | propagate |
//! | `NotFound`   | no        | degrade to empty          | propagate |
//! | `Network`    | yes       | last cached value / empty | propagate |
//! | `Timeout`    | yes       | last cached value / empty | propagate |
//! | `Unknown`    | no        | logged, degrade           | propagate |

use std::fmt;

use thiserror::Error;

/// Classified failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// RBAC denial (401/403)
    Permission,
    /// Resource or namespace does not exist
    NotFound,
    /// Transient connectivity problem
    Network,
    /// A deadline elapsed, remote work may still be running
    Timeout,
    /// Anything that matched no marker
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Permission => "Permission",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Network => "Network",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Unknown => "Unknown",
        }
    }

    /// Whether retrying the same request can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }

    /// Whether a read may fall back to the last cached snapshot
    pub fn allows_cached_fallback(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }

    /// Short message suitable for surfacing to a user
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Permission => "cannot perform operation, check access",
            ErrorKind::NotFound => "resource no longer exists",
            ErrorKind::Network => "cluster is unreachable",
            ErrorKind::Timeout => "timed out waiting for the cluster, the operation may still complete",
            ErrorKind::Unknown => "unexpected error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error returned by every fallible ArgoCD operation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArgoError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Unknown(String),
}

impl ArgoError {
    /// Build an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Permission => Self::Permission(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Network => Self::Network(message),
            ErrorKind::Timeout => Self::Timeout(message),
            ErrorKind::Unknown => Self::Unknown(message),
        }
    }

    /// Classify a raw executor failure
    ///
    /// Errors that are already classified pass through with their kind intact.
    /// `Unknown` failures are logged with the full error chain since nothing
    /// upstream will know how to explain them.
    pub fn from_raw(err: &anyhow::Error) -> Self {
        let kind = classify(err);
        let message = format!("{:#}", err);
        if kind == ErrorKind::Unknown {
            tracing::error!(error = %message, "Unclassified cluster error");
        }
        Self::new(kind, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArgoError::Permission(_) => ErrorKind::Permission,
            ArgoError::NotFound(_) => ErrorKind::NotFound,
            ArgoError::Network(_) => ErrorKind::Network,
            ArgoError::Timeout(_) => ErrorKind::Timeout,
            ArgoError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Raw message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            ArgoError::Permission(m)
            | ArgoError::NotFound(m)
            | ArgoError::Network(m)
            | ArgoError::Timeout(m)
            | ArgoError::Unknown(m) => m,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Result type for ArgoCD operations
pub type ArgoResult<T> = Result<T, ArgoError>;

const PERMISSION_MARKERS: &[&str] = &["forbidden", "unauthorized", "permission denied", "rbac"];
const NOT_FOUND_MARKERS: &[&str] = &["not found", "(notfound)"];
const NETWORK_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "econnrefused",
    "econnreset",
    "enotfound",
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "no route to host",
    "network is unreachable",
    "unreachable",
    "broken pipe",
    "error trying to connect",
    "tcp connect error",
];
const TIMEOUT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "deadline exceeded",
    "deadline has elapsed",
    "etimedout",
];

/// Map a raw failure to an [`ErrorKind`]
///
/// Walks the whole error chain. Already-classified errors and structured
/// Kubernetes API responses are trusted first; otherwise the rendered chain is
/// matched against marker lists in a fixed order: permission, not found,
/// network, timeout.
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(argo) = cause.downcast_ref::<ArgoError>() {
            return argo.kind();
        }
        if let Some(kube::Error::Api(response)) = cause.downcast_ref::<kube::Error>() {
            if let Some(kind) = classify_status_code(response.code) {
                return kind;
            }
        }
        if cause.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return ErrorKind::Timeout;
        }
    }

    classify_message(&format!("{:#}", err))
}

/// Classify a bare error message
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(PERMISSION_MARKERS) {
        ErrorKind::Permission
    } else if contains_any(NOT_FOUND_MARKERS) {
        ErrorKind::NotFound
    } else if contains_any(NETWORK_MARKERS) {
        ErrorKind::Network
    } else if contains_any(TIMEOUT_MARKERS) {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}

fn classify_status_code(code: u16) -> Option<ErrorKind> {
    match code {
        401 | 403 => Some(ErrorKind::Permission),
        404 | 410 => Some(ErrorKind::NotFound),
        408 | 504 => Some(ErrorKind::Timeout),
        502 | 503 => Some(ErrorKind::Network),
        _ => None,
    }
}
