//! The error taxonomy surfaced by every layer of the executor pipeline.
//!
//! Kinds, not types: a [`DnsError`] variant describes *why* a query failed,
//! not which component failed it. Composition layers (retry, fallback,
//! selective transport) only ever forward or combine these variants, they
//! never invent new ones.

use std::io;

/// Response code carried by a decoded DNS header, named per RFC 1035 §4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCodeName {
    FormatError,
    ServerFailure,
    NonExistentDomain,
    NotImplemented,
    Refused,
    Other(u8),
}

impl std::fmt::Display for ResponseCodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FormatError => write!(f, "Format Error"),
            Self::ServerFailure => write!(f, "Server Failure"),
            Self::NonExistentDomain => write!(f, "Non-Existent Domain / NXDOMAIN"),
            Self::NotImplemented => write!(f, "Not Implemented"),
            Self::Refused => write!(f, "Refused"),
            Self::Other(code) => write!(f, "Unknown RCODE {code}"),
        }
    }
}

/// Every error the resolver surface can hand back to a caller.
///
/// `Clone` lets [`crate::executor::coop::CoopExecutor`] hand the same
/// outcome to every query it coalesced without re-running the inner
/// executor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DnsError {
    /// A transport or protocol failure: connection refused, peer reset,
    /// malformed response, a write that didn't cover the whole packet, or a
    /// query packet too large for the chosen transport.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The wall-clock deadline for a query elapsed before it settled.
    #[error("query for {name} timed out after {deadline:?}")]
    Timeout {
        name: String,
        deadline: std::time::Duration,
    },

    /// A UDP response had the TC bit set. Consumed internally by
    /// [`crate::executor::selective::SelectiveExecutor`]; callers of the
    /// resolver should never see this variant escape the stack.
    #[error("response was truncated")]
    ResponseTruncated,

    /// Either the response code was not `NOERROR`, or it was `NOERROR` with
    /// no matching records after CNAME chasing.
    #[error("no record found for {name}: {reason}")]
    RecordNotFound { name: String, reason: String },

    /// A nameserver address, transport scheme, or packet size was invalid
    /// for the operation being attempted.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The query's handle was cancelled before it settled.
    #[error("query was cancelled")]
    Cancelled,

    /// Both the primary and secondary executor of a
    /// [`crate::executor::fallback::FallbackExecutor`] failed. The secondary
    /// error is kept as the `source()` of this one so the cause chain is not
    /// lost.
    #[error("{message}")]
    Fallback {
        message: String,
        #[source]
        secondary: Box<DnsError>,
    },
}

impl DnsError {
    pub fn record_not_found(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RecordNotFound {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`DnsError::RecordNotFound`] from a non-OK response code,
    /// per spec: the RCODE's human name becomes the failure reason.
    pub fn from_response_code(name: impl Into<String>, rcode: ResponseCodeName) -> Self {
        Self::record_not_found(name, rcode.to_string())
    }

    /// Combines a primary and secondary failure the way
    /// [`crate::executor::fallback::FallbackExecutor`] must: the message
    /// concatenates both, the secondary is preserved as the `source()`.
    pub fn fallback_combine(primary: DnsError, secondary: DnsError) -> Self {
        let message = format!("{primary}. Fallback failed: {secondary}");
        Self::Fallback {
            message,
            secondary: Box::new(secondary),
        }
    }
}

impl From<io::Error> for DnsError {
    fn from(err: io::Error) -> Self {
        DnsError::QueryFailed(err.to_string())
    }
}
