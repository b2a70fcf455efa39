use std::fmt;
use std::sync::OnceLock;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde_json::Value;

use crate::error::{ClientError, FaultBody};
use crate::transport::TransportReply;

/// One transport result, wrapped for classification.
///
/// Content sniffing and JSON decoding are derived on demand; a
/// successful decode is cached since the body never changes.
pub struct Response {
    reply: TransportReply,
    decoded: OnceLock<Value>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.reply.status)
            .field("effective_url", &self.reply.effective_url)
            .field("body_len", &self.reply.body.len())
            .finish()
    }
}

impl Response {
    pub fn new(reply: TransportReply) -> Self {
        Self {
            reply,
            decoded: OnceLock::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.reply.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.reply.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.reply.body
    }

    pub fn into_body(self) -> Bytes {
        self.reply.body
    }

    /// URL the transport ended up talking to, after redirects.
    pub fn effective_url(&self) -> &str {
        &self.reply.effective_url
    }

    /// Transport-level diagnostic for failed exchanges.
    pub fn transport_message(&self) -> &str {
        &self.reply.message
    }

    pub fn content_type(&self) -> Option<&str> {
        self.reply
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// True when a Content-Type header is present and mentions
    /// `application/json`, parameterized variants included.
    pub fn json_content(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Body decoded as JSON, cached after the first successful parse.
    pub fn decoded_json(&self) -> Result<&Value, ClientError> {
        if let Some(value) = self.decoded.get() {
            return Ok(value);
        }
        let value: Value =
            serde_json::from_slice(&self.reply.body).map_err(|_| ClientError::InvalidContent {
                body: self.reply.body.clone(),
                expected: "json",
            })?;
        Ok(self.decoded.get_or_init(|| value))
    }

    /// Decoded JSON when the body claims to be JSON and parses; the raw
    /// bytes otherwise. Never fails: error construction needs some body
    /// representation regardless of validity.
    pub fn raw_or_decoded(&self) -> FaultBody {
        if self.json_content() {
            if let Ok(value) = self.decoded_json() {
                return FaultBody::Json(value.clone());
            }
        }
        FaultBody::Raw(self.reply.body.clone())
    }
}
