//! Typed HTTP service client.
//!
//! Layers configurable behavior over a pluggable transport engine:
//! composable middleware, automatic JSON encode/decode, status-code
//! driven error classification, a single retry for idempotent methods
//! that time out, and declarative field-level response postprocessing.
//!
//! A [`Client`] is an immutable value. [`Client::set`] and
//! [`Client::path`] derive new clients instead of mutating, so one
//! configured instance can be shared across concurrent callers without
//! locking.
//!
//! # Examples
//!
//! ## Basic usage
//!
//! ```no_run
//! use svc_client::{Body, Client, ClientOptions, Params};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), svc_client::ClientError> {
//! let client = Client::new("https://widgets.internal", ClientOptions::new())?;
//!
//! let widgets = client.path("/v1/widgets/{id}", &Params::from([(
//!     "id".to_string(),
//!     "42".to_string(),
//! )]));
//!
//! let reply = widgets.get(&Params::new()).await?;
//! println!("{:?}", reply.json());
//!
//! let created = client
//!     .path("/v1/widgets", &Params::new())
//!     .post(Body::Json(json!({"name": "sprocket"})), &Params::new())
//!     .await?;
//! # let _ = created;
//! # Ok(())
//! # }
//! ```
//!
//! ## Postprocessing
//!
//! ```no_run
//! use regex::Regex;
//! use serde_json::{json, Value};
//! use svc_client::{Client, ClientOptions, PostprocessRule};
//!
//! # fn example() -> Result<(), svc_client::ClientError> {
//! // Coerce decimal-string "amount" fields into numbers everywhere in
//! // every decoded response.
//! let rule = PostprocessRule::new(Regex::new("amount$").unwrap(), |v: Value| match &v {
//!     Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(v),
//!     _ => v,
//! });
//!
//! let client = Client::new(
//!     "https://billing.internal",
//!     ClientOptions::new().postprocess(rule),
//! )?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```
//!
//! ## Middleware
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use svc_client::{
//!     Client, ClientError, ClientOptions, Handler, Request, Response,
//! };
//!
//! /// Adds a bearer token to every outgoing request.
//! struct BearerAuth {
//!     token: String,
//!     next: Arc<dyn Handler>,
//! }
//!
//! #[async_trait]
//! impl Handler for BearerAuth {
//!     async fn call(&self, req: &Request) -> Result<Response, ClientError> {
//!         let mut req = req.clone();
//!         req.headers_mut().insert(
//!             http::header::AUTHORIZATION,
//!             format!("Bearer {}", self.token).parse().unwrap(),
//!         );
//!         self.next.call(&req).await
//!     }
//! }
//!
//! # fn example() -> Result<(), ClientError> {
//! let token = "secret".to_string();
//! let client = Client::new(
//!     "https://widgets.internal",
//!     ClientOptions::new().middleware(Arc::new(move |next: Arc<dyn Handler>| {
//!         Arc::new(BearerAuth { token: token.clone(), next }) as Arc<dyn Handler>
//!     })),
//! )?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod body;
mod chain;
mod client;
mod error;
mod postprocess;
mod request;
mod response;
mod transport;

// Re-export public API
pub use body::Body;
pub use chain::{Handler, Middleware};
pub use client::{Client, ClientOptions, Reply};
pub use error::{ClientError, Fault, FaultBody};
pub use postprocess::{postprocess, PostprocessRule, Transform};
pub use request::{Params, Request};
pub use response::Response;
pub use transport::{ReqwestTransport, TransferStatus, Transport, TransportReply};

// Re-export commonly used types from dependencies
pub use http::{Method, StatusCode};
