use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;

/// Request payload handed to the verb methods.
///
/// `Json` payloads are serialized by the client; `Bytes` payloads are
/// passed through to the transport unmodified (form encoding and other
/// non-JSON representations are prepared by the caller). Empty payloads
/// are omitted from the request entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Bytes(Bytes),
}

impl Body {
    pub fn empty() -> Self {
        Body::Empty
    }

    /// Build a JSON payload from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ClientError> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// True when nothing would be sent: no payload, an empty JSON
    /// object/array/string, or zero bytes.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Json(Value::Object(map)) => map.is_empty(),
            Body::Json(Value::Array(items)) => items.is_empty(),
            Body::Json(Value::String(s)) => s.is_empty(),
            Body::Json(_) => false,
            Body::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(Bytes::from(s))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Bytes(Bytes::from(s.to_string()))
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}
