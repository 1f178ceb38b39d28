//! JSON-RPC Transport
//!
//! The only component that talks HTTP to the foreign chain. Everything it
//! returns is already normalized into an [`RpcOutcome`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::outcome::RpcOutcome;

/// Unreliable request/response channel to a foreign-chain node
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> RpcOutcome<Value>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC over HTTP
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> RpcOutcome<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => return RpcOutcome::TransportFailure(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return RpcOutcome::TransportFailure(format!("HTTP {}", status));
        }

        let body: JsonRpcResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return RpcOutcome::TransportFailure(format!("undecodable body: {}", e)),
        };

        normalize_response(body)
    }
}

fn normalize_response(body: JsonRpcResponse) -> RpcOutcome<Value> {
    match body.error {
        Some(error) => RpcOutcome::Error {
            code: error.code,
            message: error.message,
        },
        None => RpcOutcome::Result(body.result.unwrap_or(Value::Null)),
    }
}
