use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::request::Request;
use crate::response::Response;

/// One link of the request pipeline: the terminal transport call, or a
/// middleware wrapping it.
///
/// Middleware observes exactly what the wrapped handler produced; the
/// chain performs no implicit propagation or error translation, so a
/// middleware that never invokes its wrapped handler short-circuits
/// the call.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: &Request) -> Result<Response, ClientError>;
}

/// Middleware descriptor: wraps the already-composed inner handler and
/// returns the new outer one. Constructor arguments beyond the wrapped
/// handler live on the descriptor value itself.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler>;
}

/// Plain functions and closures work as descriptors directly.
impl<F> Middleware for F
where
    F: Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync,
{
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        (self)(next)
    }
}

/// Compose the configured middleware around the terminal handler.
///
/// Folding from last to first leaves the first-listed middleware
/// outermost, so it receives the call before everything it precedes.
pub(crate) fn compose(
    middleware: &[Arc<dyn Middleware>],
    terminal: Arc<dyn Handler>,
) -> Arc<dyn Handler> {
    middleware
        .iter()
        .rev()
        .fold(terminal, |next, descriptor| descriptor.wrap(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use bytes::Bytes;
    use http::{HeaderMap, Method};

    use crate::transport::{TransferStatus, TransportReply};

    struct Terminal {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Handler for Terminal {
        async fn call(&self, _req: &Request) -> Result<Response, ClientError> {
            self.log.lock().unwrap().push("terminal");
            Ok(Response::new(TransportReply {
                status: 200,
                body: Bytes::new(),
                headers: HeaderMap::new(),
                effective_url: String::new(),
                timed_out: false,
                transfer: TransferStatus::Ok,
                message: String::new(),
            }))
        }
    }

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        next: Arc<dyn Handler>,
    }

    #[async_trait]
    impl Handler for Recorder {
        async fn call(&self, req: &Request) -> Result<Response, ClientError> {
            self.log.lock().unwrap().push(self.label);
            self.next.call(req).await
        }
    }

    fn recorder(
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Middleware> {
        Arc::new(move |next: Arc<dyn Handler>| {
            Arc::new(Recorder {
                label,
                log: log.clone(),
                next,
            }) as Arc<dyn Handler>
        })
    }

    fn request() -> Request {
        Request::new(
            Method::GET,
            "http://localhost/".to_string(),
            HashMap::new(),
            HeaderMap::new(),
            None,
            Duration::from_millis(100),
            Duration::from_secs(15),
        )
    }

    #[tokio::test]
    async fn test_first_listed_middleware_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = compose(
            &[recorder("first", log.clone()), recorder("second", log.clone())],
            Arc::new(Terminal { log: log.clone() }),
        );

        chain.call(&request()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "terminal"]);
    }

    #[tokio::test]
    async fn test_empty_chain_is_the_terminal_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = compose(&[], Arc::new(Terminal { log: log.clone() }));

        chain.call(&request()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["terminal"]);
    }

    struct ShortCircuit;

    #[async_trait]
    impl Handler for ShortCircuit {
        async fn call(&self, req: &Request) -> Result<Response, ClientError> {
            Err(ClientError::RequestFailed {
                method: req.method().clone(),
                url: req.url().to_string(),
                message: "circuit open".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_middleware_that_skips_next_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let breaker: Arc<dyn Middleware> =
            Arc::new(|_next: Arc<dyn Handler>| Arc::new(ShortCircuit) as Arc<dyn Handler>);
        let chain = compose(&[breaker], Arc::new(Terminal { log: log.clone() }));

        let err = chain.call(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed { .. }));
        assert!(log.lock().unwrap().is_empty());
    }
}
