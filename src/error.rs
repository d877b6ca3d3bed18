//! Error types shared by the deliverers.

use std::{fmt, io};

use thiserror::Error;

/// Reason an endpoint gave for refusing a batch it received.
///
/// Rejections arrive with HTTP 200 and a non-zero `Code`. Retrying cannot
/// fix them, so the rejected batch is consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Codes `1` and `-1`, or a response body that is not valid JSON.
    InvalidFormat,
    /// Code `-2`.
    UnknownAppId,
    /// Code `-3`.
    InvalidIp,
    /// Any other non-zero code.
    Unknown(i64),
}

impl RejectReason {
    /// Map a non-zero response code onto a rejection reason.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 | -1 => Self::InvalidFormat,
            -2 => Self::UnknownAppId,
            -3 => Self::InvalidIp,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat => f.write_str("invalid data format"),
            Self::UnknownAppId => f.write_str("app id does not exist"),
            Self::InvalidIp => f.write_str("invalid ip transmission"),
            Self::Unknown(code) => write!(f, "unknown error (code {code})"),
        }
    }
}

/// Failures that prevent a batch from reaching an endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be completed (DNS, connect, timeout, reset).
    #[error("request to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },
    /// The endpoint answered with a status other than 200.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    /// Gzip encoding of the payload failed.
    #[error("payload compression failed: {0}")]
    Compression(#[source] io::Error),
}

/// Errors returned by [`Deliverer`](crate::Deliverer) operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Every delivery attempt against every endpoint failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The endpoint accepted the request but refused its content.
    #[error("batch rejected: {0}")]
    Rejected(RejectReason),
    /// A record could not be serialized.
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Local file I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The log writer thread stopped after an unrecoverable error.
    #[error("log writer stopped: {0}")]
    WriterFailed(String),
    /// The deliverer has been closed.
    #[error("deliverer is closed")]
    Closed,
}

impl DeliveryError {
    /// Whether the error is a semantic rejection rather than a delivery failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Invalid configuration detected while constructing a deliverer.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// A URL did not use the http or https scheme.
    #[error("invalid url '{0}': expected an http:// or https:// url")]
    InvalidUrl(String),
    /// Unrecognised rotation mode name.
    #[error("unknown rotate mode '{0}'. Valid options are: daily, hourly")]
    UnknownRotateMode(String),
    /// The mirror directory equals the primary directory.
    #[error("primary and mirror directories must differ")]
    SameDirectories,
    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    /// No section describing a deliverer was found in a configuration file.
    #[error("{0}: expected a [batch] or [log] section")]
    MissingSection(String),
    /// The configuration file could not be parsed.
    #[error("{path} is invalid: {reason}")]
    Parse { path: String, reason: String },
    /// TLS initialisation for the HTTP client failed.
    #[error("tls setup failed: {0}")]
    Tls(String),
    /// Directory creation or file access failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
