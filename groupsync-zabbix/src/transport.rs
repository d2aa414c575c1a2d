//! HTTP transport for JSON-RPC requests.

use std::time::Duration;

use serde_json::Value;

use crate::error::RpcError;

const API_PATH: &str = "api_jsonrpc.php";

/// Sends one JSON-RPC request body and returns the decoded response body.
pub trait Transport {
    fn endpoint(&self) -> &str;

    fn send(&mut self, request: &Value, bearer: Option<&str>) -> Result<Value, RpcError>;
}

/// Blocking transport over a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl UreqTransport {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: api_endpoint(url),
        }
    }
}

impl Transport for UreqTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&mut self, request: &Value, bearer: Option<&str>) -> Result<Value, RpcError> {
        let transport_err = |message: String| RpcError::Transport {
            endpoint: self.endpoint.clone(),
            message,
        };

        let mut call = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json-rpc");
        if let Some(token) = bearer {
            call = call.set("Authorization", &format!("Bearer {token}"));
        }

        let response = match call.send_json(request) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(transport_err(format!(
                    "HTTP {code} {}",
                    response.status_text()
                )))
            }
            Err(err) => return Err(transport_err(err.to_string())),
        };
        response
            .into_json::<Value>()
            .map_err(|e| transport_err(format!("invalid JSON body: {e}")))
    }
}

/// Frontend URL to API endpoint; an explicit endpoint is kept as is.
pub fn api_endpoint(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with(API_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{API_PATH}")
    }
}
