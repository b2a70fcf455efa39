use std::fmt;
use std::io;

use bytes::Bytes;
use http::Method;
use serde_json::Value;
use thiserror::Error;

/// Best-effort representation of a service error body.
///
/// Error responses that claim JSON and decode cleanly keep the decoded
/// document; everything else keeps the raw bytes for diagnosis.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultBody {
    Json(Value),
    Raw(Bytes),
}

impl FaultBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FaultBody::Json(value) => Some(value),
            FaultBody::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            FaultBody::Raw(bytes) => Some(bytes),
            FaultBody::Json(_) => None,
        }
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.as_json().and_then(|value| value.get(name))
    }
}

/// Context carried by every status-specific service error: which call
/// failed, what the service answered, and its best-effort body.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub body: FaultBody,
}

impl Fault {
    /// Conventional `message` field of a structured error body.
    pub fn message(&self) -> Option<&str> {
        self.body.field("message").and_then(Value::as_str)
    }

    /// Conventional `error` code field of a structured error body.
    pub fn error(&self) -> Option<&str> {
        self.body.field("error").and_then(Value::as_str)
    }

    /// Conventional `object` field naming the entity the error refers to.
    pub fn object(&self) -> Option<&str> {
        self.body.field("object").and_then(Value::as_str)
    }

    /// Per-field validation errors, if the service reported any.
    pub fn errors(&self) -> Option<&Value> {
        self.body.field("errors")
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{} {} ({}): {}", self.method, self.url, self.status, message),
            None => write!(f, "{} {} ({})", self.method, self.url, self.status),
        }
    }
}

/// Error type for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Construction-time failure: invalid base URI, engine construction.
    #[error("build error: {0}")]
    Build(String),

    /// A request body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport produced no usable HTTP status.
    #[error("service request failed ({method} {url}): {message}")]
    RequestFailed {
        method: Method,
        url: String,
        message: String,
    },

    /// The request timed out, surviving the single idempotent retry
    /// where one applies.
    #[error("service timed out ({method} {url}): {message}")]
    ServiceTimeout {
        method: Method,
        url: String,
        message: String,
    },

    /// The transport reported a truncated body despite a usable status.
    #[error("partial response ({method} {url}): {message}")]
    PartialResponse {
        method: Method,
        url: String,
        message: String,
    },

    /// A body that claimed to be `expected` could not be decoded as it.
    #[error("invalid {expected} content")]
    InvalidContent { body: Bytes, expected: &'static str },

    /// An error-status response whose body could not be decoded as
    /// `expected`; the raw bytes are preserved.
    #[error("{status} response with invalid {expected} content ({method} {url})")]
    ErrorWithInvalidContent {
        method: Method,
        url: String,
        status: u16,
        body: Bytes,
        expected: &'static str,
    },

    #[error("bad request: {0}")]
    BadRequest(Fault),

    #[error("forbidden: {0}")]
    Forbidden(Fault),

    #[error("not found: {0}")]
    NotFound(Fault),

    #[error("conflict: {0}")]
    Conflict(Fault),

    /// Catch-all for every other error status, unlisted and future
    /// codes included.
    #[error("service error: {0}")]
    ServiceError(Fault),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// True for the connection-level failures (no usable response):
    /// `RequestFailed`, `ServiceTimeout`, `PartialResponse`.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            ClientError::RequestFailed { .. }
                | ClientError::ServiceTimeout { .. }
                | ClientError::PartialResponse { .. }
        )
    }

    /// The service fault for status-specific errors, `None` otherwise.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ClientError::BadRequest(fault)
            | ClientError::Forbidden(fault)
            | ClientError::NotFound(fault)
            | ClientError::Conflict(fault)
            | ClientError::ServiceError(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}
