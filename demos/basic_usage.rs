//! Basic usage example for the service client.
//!
//! To run this example against a service of your choice:
//! ```bash
//! export SVC_BASE_URL="http://localhost:8080"
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use svc_client::{
    Body, Client, ClientError, ClientOptions, Handler, Params, Reply, Request, Response,
};

/// Logs every request passing through the chain.
struct RequestLogger {
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for RequestLogger {
    async fn call(&self, req: &Request) -> Result<Response, ClientError> {
        println!("-> {} {}", req.method(), req.url());
        let response = self.next.call(req).await;
        match &response {
            Ok(resp) => println!("<- {}", resp.status()),
            Err(err) => println!("<- {err}"),
        }
        response
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url =
        std::env::var("SVC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    let client = Client::new(
        base_url,
        ClientOptions::new()
            .header("X-Request-Source", "basic-usage-demo")?
            .middleware(Arc::new(|next: Arc<dyn Handler>| {
                Arc::new(RequestLogger { next }) as Arc<dyn Handler>
            })),
    )?;

    println!("=== Example 1: GET with query params ===\n");

    let widgets = client.path("/v1/widgets", &Params::new());
    match widgets
        .get(&Params::from([("limit".to_string(), "5".to_string())]))
        .await
    {
        Ok(Reply::Json(value)) => println!("{}\n", serde_json::to_string_pretty(&value)?),
        Ok(other) => println!("{other:?}\n"),
        Err(err) => println!("request failed: {err}\n"),
    }

    println!("=== Example 2: POST a JSON body ===\n");

    match widgets
        .post(Body::Json(json!({"name": "sprocket"})), &Params::new())
        .await
    {
        Ok(reply) => println!("created: {reply:?}\n"),
        Err(err) => {
            if let Some(fault) = err.fault() {
                println!("service answered {}: {:?}\n", fault.status, fault.message());
            } else {
                println!("request failed: {err}\n");
            }
        }
    }

    println!("=== Example 3: path placeholders ===\n");

    let one = client.path(
        "/v1/widgets/{id}",
        &Params::from([("id".to_string(), "42".to_string())]),
    );
    println!("resolved base: {}", one.base_uri());

    Ok(())
}
