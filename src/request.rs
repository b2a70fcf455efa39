use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

/// Query parameters, merged default-first with call-site values winning.
pub type Params = HashMap<String, String>;

/// Fully resolved request handed to the middleware chain.
///
/// Built once per call from the client configuration and the call-site
/// arguments; the snapshot itself is never mutated. Middleware that
/// wants to change something clones it and adapts the copy before
/// invoking the wrapped handler.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    params: Params,
    headers: HeaderMap,
    body: Option<Bytes>,
    connect_timeout: Duration,
    timeout: Duration,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        url: String,
        params: Params,
        headers: HeaderMap,
        body: Option<Bytes>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            method,
            url,
            params,
            headers,
            body,
            connect_timeout,
            timeout,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable header access, for middleware adapting a cloned request.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Encoded body bytes, absent for body-less requests.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
