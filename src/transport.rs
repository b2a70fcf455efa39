use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::chain::Handler;
use crate::error::ClientError;
use crate::request::Request;
use crate::response::Response;

/// How the transfer ended, independent of the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Body fully received.
    Ok,
    /// The status arrived but the body was cut short.
    Partial,
    /// No usable exchange (connection failure, engine error).
    Other,
}

/// Raw result of one transport execution.
///
/// The transport never fails as a Rust `Result`; connection-level
/// outcomes are signalled through `status` 0, `timed_out`, and
/// `transfer` so the caller classifies them in one place.
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: Bytes,
    pub headers: HeaderMap,
    pub effective_url: String,
    pub timed_out: bool,
    pub transfer: TransferStatus,
    pub message: String,
}

impl TransportReply {
    /// Reply for an exchange that never produced a usable status.
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: 0,
            body: Bytes::new(),
            headers: HeaderMap::new(),
            effective_url: url.into(),
            timed_out: false,
            transfer: TransferStatus::Other,
            message: message.into(),
        }
    }

    /// Reply for an exchange that hit the configured deadline.
    pub fn timed_out(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failed(url, message)
        }
    }
}

/// One HTTP round trip. Implemented by the bundled reqwest adapter and
/// by anything a caller injects through `Client::with_transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, req: &Request) -> TransportReply;
}

/// Default transport backed by `reqwest`.
///
/// reqwest fixes the connect timeout on the engine rather than per
/// request, so engines are cached per distinct connect timeout; the
/// total timeout is applied per request.
pub struct ReqwestTransport {
    engines: Mutex<HashMap<Duration, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
        }
    }

    fn engine_for(&self, connect_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
        let mut engines = match self.engines.lock() {
            Ok(engines) => engines,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(engine) = engines.get(&connect_timeout) {
            return Ok(engine.clone());
        }
        let engine = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        engines.insert(connect_timeout, engine.clone());
        Ok(engine)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, req: &Request) -> TransportReply {
        let engine = match self.engine_for(req.connect_timeout()) {
            Ok(engine) => engine,
            Err(e) => {
                return TransportReply::failed(req.url(), format!("engine construction failed: {e}"))
            }
        };

        let mut builder = engine
            .request(req.method().clone(), req.url())
            .headers(req.headers().clone())
            .timeout(req.timeout());
        if !req.params().is_empty() {
            builder = builder.query(req.params());
        }
        if let Some(body) = req.body() {
            builder = builder.body(body.clone());
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return TransportReply::timed_out(req.url(), e.to_string()),
            Err(e) => return TransportReply::failed(req.url(), e.to_string()),
        };

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let effective_url = resp.url().to_string();

        // The deadline also covers body receipt; a timeout here must not
        // be mistaken for a short-but-complete body.
        match resp.bytes().await {
            Ok(body) => TransportReply {
                status,
                body,
                headers,
                effective_url,
                timed_out: false,
                transfer: TransferStatus::Ok,
                message: String::new(),
            },
            Err(e) if e.is_timeout() => TransportReply {
                status,
                body: Bytes::new(),
                headers,
                effective_url,
                timed_out: true,
                transfer: TransferStatus::Other,
                message: e.to_string(),
            },
            Err(e) => TransportReply {
                status,
                body: Bytes::new(),
                headers,
                effective_url,
                timed_out: false,
                transfer: TransferStatus::Partial,
                message: e.to_string(),
            },
        }
    }
}

/// Terminal handler of every middleware chain: one transport execution
/// plus the idempotent-method retry policy, kept here so middleware
/// never duplicates it.
pub(crate) struct TransportCall {
    transport: Arc<dyn Transport>,
    retry_idempotent: bool,
}

impl TransportCall {
    pub(crate) fn new(transport: Arc<dyn Transport>, retry_idempotent: bool) -> Self {
        Self {
            transport,
            retry_idempotent,
        }
    }
}

fn retryable(method: &Method) -> bool {
    // DELETE stays out: replaying a mutating call is not worth the
    // resource-level idempotency argument.
    matches!(*method, Method::GET | Method::HEAD)
}

fn url_of(reply: &TransportReply, req: &Request) -> String {
    if reply.effective_url.is_empty() {
        req.url().to_string()
    } else {
        reply.effective_url.clone()
    }
}

#[async_trait]
impl Handler for TransportCall {
    async fn call(&self, req: &Request) -> Result<Response, ClientError> {
        let mut reply = self.transport.execute(req).await;

        if reply.timed_out && self.retry_idempotent && retryable(req.method()) {
            tracing::warn!(
                method = %req.method(),
                url = %req.url(),
                "request timed out, retrying once"
            );
            reply = self.transport.execute(req).await;
        }

        if reply.timed_out {
            return Err(ClientError::ServiceTimeout {
                method: req.method().clone(),
                url: url_of(&reply, req),
                message: reply.message,
            });
        }

        if reply.transfer == TransferStatus::Partial {
            return Err(ClientError::PartialResponse {
                method: req.method().clone(),
                url: url_of(&reply, req),
                message: reply.message,
            });
        }

        Ok(Response::new(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport returning scripted replies and counting executions.
    struct ScriptedTransport {
        replies: Vec<TransportReply>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<TransportReply>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, _req: &Request) -> TransportReply {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies[n.min(self.replies.len() - 1)].clone()
        }
    }

    fn request(method: Method) -> Request {
        Request::new(
            method,
            "http://localhost/widgets".to_string(),
            HashMap::new(),
            HeaderMap::new(),
            None,
            Duration::from_millis(100),
            Duration::from_secs(15),
        )
    }

    fn ok_reply() -> TransportReply {
        TransportReply {
            status: 200,
            body: Bytes::from_static(b"ok"),
            headers: HeaderMap::new(),
            effective_url: "http://localhost/widgets".to_string(),
            timed_out: false,
            transfer: TransferStatus::Ok,
            message: String::new(),
        }
    }

    fn timeout_reply() -> TransportReply {
        TransportReply::timed_out("http://localhost/widgets", "operation timed out")
    }

    #[tokio::test]
    async fn test_get_timeout_retries_once_and_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout_reply(), ok_reply()]));
        let call = TransportCall::new(transport.clone(), true);

        let response = call.call(&request(Method::GET)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_head_timeout_retries_once_and_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout_reply(), ok_reply()]));
        let call = TransportCall::new(transport.clone(), true);

        let response = call.call(&request(Method::HEAD)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_get_timeout_persisting_through_retry_fails() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout_reply(), timeout_reply()]));
        let call = TransportCall::new(transport.clone(), true);

        let err = call.call(&request(Method::GET)).await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceTimeout { .. }));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_post_timeout_never_retries() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout_reply(), ok_reply()]));
        let call = TransportCall::new(transport.clone(), true);

        let err = call.call(&request(Method::POST)).await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceTimeout { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_timeout_never_retries() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout_reply(), ok_reply()]));
        let call = TransportCall::new(transport.clone(), true);

        let err = call.call(&request(Method::DELETE)).await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceTimeout { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_disabled_fails_on_first_timeout() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout_reply(), ok_reply()]));
        let call = TransportCall::new(transport.clone(), false);

        let err = call.call(&request(Method::GET)).await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceTimeout { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_transfer_fails() {
        let reply = TransportReply {
            status: 200,
            transfer: TransferStatus::Partial,
            message: "connection reset mid-body".to_string(),
            ..ok_reply()
        };
        let transport = Arc::new(ScriptedTransport::new(vec![reply]));
        let call = TransportCall::new(transport.clone(), true);

        let err = call.call(&request(Method::GET)).await.unwrap_err();
        assert!(matches!(err, ClientError::PartialResponse { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_deferred_to_classification() {
        let transport = Arc::new(ScriptedTransport::new(vec![TransportReply::failed(
            "http://localhost/widgets",
            "connection refused",
        )]));
        let call = TransportCall::new(transport, true);

        // Status 0 is not this layer's concern; the classifier owns it.
        let response = call.call(&request(Method::GET)).await.unwrap();
        assert_eq!(response.status(), 0);
        assert_eq!(response.transport_message(), "connection refused");
    }
}
