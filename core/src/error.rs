//! Error taxonomy for the JSON REST client.
//!
//! # Design
//! Failures fall into four families: local validation (`Config`, `Filter`),
//! transport (`Transport`), decoding (`Decode`, `Serialization`), and
//! application failures reported by the server (`Failure`). Application
//! failures are specialized by `FailureKind`, which is selected from the
//! envelope's `type` field. Unknown types fall back to `FailureKind::ApiFailure`.

use std::fmt;

/// Discriminant of an application-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Generic failure; also used for unrecognized wire types.
    ApiFailure,
    ObjectMissing,
    AuthenticationRequired,
    AuthenticationFailed,
    ModelNotRegistered,
    HttpsRequired,
    /// Malformed filter expression, raised before any request is sent.
    OperatorNotFound,
}

impl FailureKind {
    /// Select a kind from the server-supplied `type` field.
    ///
    /// The server names the type after its error class, so both the
    /// `ObjectMissingException` and `ObjectMissingError` spellings are
    /// accepted. `Forbidden` is the server's name for a failed login.
    pub fn from_wire_type(error_type: Option<&str>) -> Self {
        let Some(name) = error_type else {
            return FailureKind::ApiFailure;
        };
        let name = name
            .strip_suffix("Exception")
            .or_else(|| name.strip_suffix("Error"))
            .unwrap_or(name);
        match name {
            "ObjectMissing" => FailureKind::ObjectMissing,
            "AuthenticationRequired" => FailureKind::AuthenticationRequired,
            "AuthenticationFailed" | "Forbidden" => FailureKind::AuthenticationFailed,
            "ModelNotRegistered" => FailureKind::ModelNotRegistered,
            "HttpsRequired" => FailureKind::HttpsRequired,
            "OperatorNotFound" => FailureKind::OperatorNotFound,
            _ => FailureKind::ApiFailure,
        }
    }

    /// Kind implied by a bare HTTP status when the body carries no envelope.
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(FailureKind::AuthenticationRequired),
            403 => Some(FailureKind::AuthenticationFailed),
            404 => Some(FailureKind::ObjectMissing),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ApiFailure => "ApiFailure",
            FailureKind::ObjectMissing => "ObjectMissing",
            FailureKind::AuthenticationRequired => "AuthenticationRequired",
            FailureKind::AuthenticationFailed => "AuthenticationFailed",
            FailureKind::ModelNotRegistered => "ModelNotRegistered",
            FailureKind::HttpsRequired => "HttpsRequired",
            FailureKind::OperatorNotFound => "OperatorNotFound",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the server through a non-success envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiFailure {
    pub kind: FailureKind,
    pub message: String,
    /// The raw `type` field as sent by the server, if any.
    pub error_type: Option<String>,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>, error_type: Option<String>) -> Self {
        Self {
            kind: FailureKind::from_wire_type(error_type.as_deref()),
            message: message.into(),
            error_type,
        }
    }
}

/// A filter expression rejected before any request was built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// No space separates the property name from the operator.
    #[error(
        "operator not found in expression '{expression}' (is a space missing between the property name and the operator?)"
    )]
    OperatorNotFound { expression: String },

    /// The token after the space is not a known operator.
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },
}

impl FilterError {
    /// Discriminant string, in the same shape as a server `type` field.
    pub fn error_type(&self) -> &'static str {
        match self {
            FilterError::OperatorNotFound { .. } => "OperatorNotFound",
            FilterError::UnsupportedOperator { .. } => "UnsupportedOperator",
        }
    }
}

/// Transport-level failure: connection, TLS, timeout, or unreadable body.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors returned by every public client operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The client configuration is unusable (for example an empty base path).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The server answered with a non-success envelope.
    #[error(transparent)]
    Failure(#[from] ApiFailure),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response body is not a valid envelope for the expected result.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Taxonomy kind for local filter errors and server failures.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ApiError::Filter(_) => Some(FailureKind::OperatorNotFound),
            ApiError::Failure(failure) => Some(failure.kind),
            _ => None,
        }
    }

    /// Human-readable message carried by a filter error or server failure.
    pub fn message(&self) -> Option<String> {
        match self {
            ApiError::Filter(err) => Some(err.to_string()),
            ApiError::Failure(failure) => Some(failure.message.clone()),
            _ => None,
        }
    }

    /// Type discriminant carried by a filter error or server failure.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            ApiError::Filter(err) => Some(err.error_type()),
            ApiError::Failure(failure) => failure.error_type.as_deref(),
            _ => None,
        }
    }
}
