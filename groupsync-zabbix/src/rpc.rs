//! JSON-RPC 2.0 envelope handling and session token placement.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use groupsync_core::config::AuthMode;

use crate::error::RpcError;
use crate::transport::Transport;

/// Methods that must be called without a session token.
const UNAUTHENTICATED: &[&str] = &["user.login", "apiinfo.version"];

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Value,
}

pub struct RpcClient<T> {
    transport: T,
    mode: AuthMode,
    token: Option<String>,
    next_id: u64,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T, mode: AuthMode) -> Self {
        Self {
            transport,
            mode,
            token: None,
            next_id: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn call<R: DeserializeOwned>(&mut self, method: &str, params: Value) -> Result<R, RpcError> {
        self.next_id += 1;
        let mut body = Map::new();
        body.insert("jsonrpc".into(), json!("2.0"));
        body.insert("method".into(), json!(method));
        body.insert("params".into(), params);
        body.insert("id".into(), json!(self.next_id));

        let token = self
            .token
            .as_deref()
            .filter(|_| !UNAUTHENTICATED.contains(&method));
        let bearer = match (self.mode, token) {
            (AuthMode::Body, Some(token)) => {
                body.insert("auth".into(), json!(token));
                None
            }
            (AuthMode::Header, token) => token,
            (AuthMode::Body, None) => None,
        };

        debug!(method, id = self.next_id, "api call");
        let response = self.transport.send(&Value::Object(body), bearer)?;
        let envelope: Envelope =
            serde_json::from_value(response).map_err(|source| RpcError::Decode {
                method: method.to_string(),
                source,
            })?;

        if let Some(err) = envelope.error {
            let data = match err.data {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            return Err(RpcError::Api {
                method: method.to_string(),
                code: err.code,
                message: err.message,
                data,
            });
        }
        serde_json::from_value(envelope.result.unwrap_or(Value::Null)).map_err(|source| {
            RpcError::Decode {
                method: method.to_string(),
                source,
            }
        })
    }
}
