use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;

use crate::body::Body;
use crate::chain::{compose, Middleware};
use crate::error::{ClientError, Fault, FaultBody};
use crate::postprocess::{postprocess, PostprocessRule};
use crate::request::{Params, Request};
use crate::response::Response;
use crate::transport::{ReqwestTransport, Transport, TransportCall};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT_VALUE: &str = concat!("svc-client/", env!("CARGO_PKG_VERSION"));

/// Success value of a verb call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Decoded and postprocessed JSON document.
    Json(Value),
    /// Raw body of a non-JSON success.
    Raw(Bytes),
    /// 204/205: the service answered, there is nothing to read.
    Empty,
}

impl Reply {
    pub fn json(&self) -> Option<&Value> {
        match self {
            Reply::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn raw(&self) -> Option<&Bytes> {
        match self {
            Reply::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }
}

/// Overrides applied at construction or through [`Client::set`].
///
/// Headers merge key-wise over what the client already has, middleware
/// concatenates after the existing list, every other field present here
/// replaces its predecessor wholesale.
#[derive(Default, Clone)]
pub struct ClientOptions {
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    params: Option<Params>,
    headers: Option<HeaderMap>,
    postprocessing: Option<Vec<PostprocessRule>>,
    middleware: Vec<Arc<dyn Middleware>>,
    retry_idempotent: Option<bool>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the default query params wholesale.
    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Add one default query param.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(Params::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the header overrides wholesale.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Add one header override.
    pub fn header<K, V>(mut self, key: K, value: V) -> Result<Self, ClientError>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
        K::Error: fmt::Display,
        V::Error: fmt::Display,
    {
        let key = key
            .try_into()
            .map_err(|e| ClientError::Build(format!("invalid header name: {e}")))?;
        let value = value
            .try_into()
            .map_err(|e| ClientError::Build(format!("invalid header value: {e}")))?;
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(key, value);
        Ok(self)
    }

    /// Replace the postprocessing rules wholesale.
    pub fn postprocessing(mut self, rules: Vec<PostprocessRule>) -> Self {
        self.postprocessing = Some(rules);
        self
    }

    /// Add one postprocessing rule.
    pub fn postprocess(mut self, rule: PostprocessRule) -> Self {
        self.postprocessing.get_or_insert_with(Vec::new).push(rule);
        self
    }

    /// Append a middleware descriptor. Middleware never replaces what
    /// is already configured, it only accumulates.
    pub fn middleware(mut self, descriptor: Arc<dyn Middleware>) -> Self {
        self.middleware.push(descriptor);
        self
    }

    /// Toggle the single GET/HEAD retry on timeout.
    pub fn retry_idempotent(mut self, enabled: bool) -> Self {
        self.retry_idempotent = Some(enabled);
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("params", &self.params)
            .field("middleware", &self.middleware.len())
            .field("retry_idempotent", &self.retry_idempotent)
            .finish()
    }
}

#[derive(Clone)]
struct ClientConfig {
    base_uri: String,
    connect_timeout: Duration,
    timeout: Duration,
    params: Params,
    headers: HeaderMap,
    postprocessing: Vec<PostprocessRule>,
    middleware: Vec<Arc<dyn Middleware>>,
    retry_idempotent: bool,
}

impl ClientConfig {
    fn defaults(base_uri: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            base_uri,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            params: Params::new(),
            headers,
            postprocessing: Vec::new(),
            middleware: Vec::new(),
            retry_idempotent: true,
        }
    }

    fn apply(mut self, options: ClientOptions) -> Self {
        if let Some(timeout) = options.connect_timeout {
            self.connect_timeout = timeout;
        }
        if let Some(timeout) = options.timeout {
            self.timeout = timeout;
        }
        if let Some(params) = options.params {
            self.params = params;
        }
        if let Some(headers) = options.headers {
            for (name, value) in headers.iter() {
                self.headers.insert(name.clone(), value.clone());
            }
        }
        if let Some(rules) = options.postprocessing {
            self.postprocessing = rules;
        }
        self.middleware.extend(options.middleware);
        if let Some(enabled) = options.retry_idempotent {
            self.retry_idempotent = enabled;
        }
        self
    }
}

/// Immutable HTTP service client.
///
/// A `Client` is a value: [`set`](Client::set) and
/// [`path`](Client::path) return new clients and never touch the
/// original, so one instance can be shared freely across concurrent
/// callers.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_uri", &self.config.base_uri)
            .field("connect_timeout", &self.config.connect_timeout)
            .field("timeout", &self.config.timeout)
            .field("middleware", &self.config.middleware.len())
            .finish()
    }
}

impl Client {
    /// Create a client for the given base URI with the bundled reqwest
    /// transport.
    pub fn new(base_uri: impl Into<String>, options: ClientOptions) -> Result<Self, ClientError> {
        Self::with_transport(base_uri, options, Arc::new(ReqwestTransport::new()))
    }

    /// Create a client over a caller-supplied transport engine.
    pub fn with_transport(
        base_uri: impl Into<String>,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let base_uri = base_uri.into();
        url::Url::parse(&base_uri)
            .map_err(|e| ClientError::Build(format!("invalid base URI '{base_uri}': {e}")))?;
        Ok(Self {
            config: Arc::new(ClientConfig::defaults(base_uri).apply(options)),
            transport,
        })
    }

    /// Derive a new client with the given overrides applied.
    pub fn set(&self, options: ClientOptions) -> Self {
        Self {
            config: Arc::new((*self.config).clone().apply(options)),
            transport: self.transport.clone(),
        }
    }

    /// Derive a new client whose base URI is extended by `template`,
    /// with `{name}` placeholders substituted from `vars`.
    ///
    /// Values are percent-escaped (a space becomes `%20`, never `+`).
    /// Placeholders without a matching variable are left intact.
    pub fn path(&self, template: &str, vars: &Params) -> Self {
        let mut segment = template.to_string();
        for (name, value) in vars {
            segment = segment.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
        }

        let base = &self.config.base_uri;
        let joined = match (base.ends_with('/'), segment.starts_with('/')) {
            (true, true) => format!("{}{}", base, &segment[1..]),
            (false, false) => format!("{base}/{segment}"),
            _ => format!("{base}{segment}"),
        };
        self.with_base_uri(joined)
    }

    /// Derive a new client with `value` appended to the base URI as one
    /// percent-escaped path segment.
    pub fn join(&self, value: &str) -> Self {
        let encoded = urlencoding::encode(value);
        let base = &self.config.base_uri;
        let joined = if base.ends_with('/') {
            format!("{base}{encoded}")
        } else {
            format!("{base}/{encoded}")
        };
        self.with_base_uri(joined)
    }

    /// Derive a new client with a `.ext` representation suffix appended
    /// to the base URI.
    pub fn extension(&self, ext: &str) -> Self {
        let base = &self.config.base_uri;
        let suffixed = if base.ends_with('.') {
            format!("{}{}", base, urlencoding::encode(ext))
        } else {
            format!("{}.{}", base, urlencoding::encode(ext))
        };
        self.with_base_uri(suffixed)
    }

    fn with_base_uri(&self, base_uri: String) -> Self {
        let mut config = (*self.config).clone();
        config.base_uri = base_uri;
        Self {
            config: Arc::new(config),
            transport: self.transport.clone(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.config.base_uri
    }

    pub async fn get(&self, params: &Params) -> Result<Reply, ClientError> {
        self.request(Method::GET, Body::Empty, params).await
    }

    pub async fn delete(&self, params: &Params) -> Result<Reply, ClientError> {
        self.request(Method::DELETE, Body::Empty, params).await
    }

    pub async fn post(&self, body: Body, params: &Params) -> Result<Reply, ClientError> {
        self.request(Method::POST, body, params).await
    }

    pub async fn put(&self, body: Body, params: &Params) -> Result<Reply, ClientError> {
        self.request(Method::PUT, body, params).await
    }

    pub async fn patch(&self, body: Body, params: &Params) -> Result<Reply, ClientError> {
        self.request(Method::PATCH, body, params).await
    }

    /// Execute one request through the middleware chain and classify
    /// the outcome.
    pub async fn request(
        &self,
        method: Method,
        body: Body,
        params: &Params,
    ) -> Result<Reply, ClientError> {
        let request = self.resolve(method, body, params)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "executing request");

        let terminal = Arc::new(TransportCall::new(
            self.transport.clone(),
            self.config.retry_idempotent,
        ));
        let chain = compose(&self.config.middleware, terminal);
        let response = chain.call(&request).await?;

        classify(&request, response, &self.config.postprocessing)
    }

    /// Blocking variant of [`request`](Client::request) for sync
    /// contexts such as build scripts. Uses the current tokio runtime
    /// if one exists, or a temporary one otherwise.
    pub fn request_blocking(
        &self,
        method: Method,
        body: Body,
        params: &Params,
    ) -> Result<Reply, ClientError> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(self.request(method, body, params)),
            Err(_) => tokio::runtime::Runtime::new()?.block_on(self.request(method, body, params)),
        }
    }

    /// Snapshot the fully resolved request for one call.
    fn resolve(&self, method: Method, body: Body, params: &Params) -> Result<Request, ClientError> {
        let mut merged = self.config.params.clone();
        for (key, value) in params {
            merged.insert(key.clone(), value.clone());
        }

        Ok(Request::new(
            method,
            self.config.base_uri.clone(),
            merged,
            self.config.headers.clone(),
            encode_body(&body)?,
            self.config.connect_timeout,
            self.config.timeout,
        ))
    }
}

fn encode_body(body: &Body) -> Result<Option<Bytes>, ClientError> {
    if body.is_empty() {
        return Ok(None);
    }
    match body {
        Body::Empty => Ok(None),
        Body::Json(value) => Ok(Some(Bytes::from(serde_json::to_vec(value)?))),
        Body::Bytes(bytes) => Ok(Some(bytes.clone())),
    }
}

fn classify(
    req: &Request,
    response: Response,
    rules: &[PostprocessRule],
) -> Result<Reply, ClientError> {
    match response.status() {
        204 | 205 => Ok(Reply::Empty),
        200..=203 | 206..=299 => {
            if response.json_content() {
                let decoded = response.decoded_json()?.clone();
                Ok(Reply::Json(postprocess(rules, decoded)))
            } else {
                Ok(Reply::Raw(response.into_body()))
            }
        }
        0 => Err(ClientError::RequestFailed {
            method: req.method().clone(),
            url: url_of(&response, req),
            message: response.transport_message().to_string(),
        }),
        status => Err(status_error(req, &response, status)),
    }
}

fn status_error(req: &Request, response: &Response, status: u16) -> ClientError {
    let url = url_of(response, req);
    let body = if response.json_content() {
        match response.decoded_json() {
            Ok(value) => FaultBody::Json(value.clone()),
            Err(_) => {
                // An error status with a body that claims JSON but does
                // not parse is its own failure mode; the raw bytes are
                // kept for diagnosis.
                return ClientError::ErrorWithInvalidContent {
                    method: req.method().clone(),
                    url,
                    status,
                    body: response.body().clone(),
                    expected: "json",
                };
            }
        }
    } else {
        FaultBody::Raw(response.body().clone())
    };

    let fault = Fault {
        method: req.method().clone(),
        url,
        status,
        body,
    };
    match status {
        400 => ClientError::BadRequest(fault),
        403 => ClientError::Forbidden(fault),
        404 => ClientError::NotFound(fault),
        409 => ClientError::Conflict(fault),
        _ => ClientError::ServiceError(fault),
    }
}

fn url_of(response: &Response, req: &Request) -> String {
    if response.effective_url().is_empty() {
        req.url().to_string()
    } else {
        response.effective_url().to_string()
    }
}
