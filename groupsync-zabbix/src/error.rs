//! Error types for groupsync-zabbix.

use thiserror::Error;

use groupsync_core::ProviderError;

#[derive(Debug, Error)]
pub enum RpcError {
    /// The HTTP exchange itself failed.
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The API answered with a JSON-RPC error object.
    #[error("{method} failed ({code}): {message} {data}")]
    Api {
        method: String,
        code: i64,
        message: String,
        data: String,
    },

    #[error("unexpected {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RpcError {
    pub(crate) fn into_provider(self, endpoint: &str) -> ProviderError {
        match self {
            RpcError::Transport { endpoint, message } => {
                ProviderError::Connectivity { endpoint, message }
            }
            RpcError::Api { ref method, .. } if method == "user.login" => {
                ProviderError::Authentication {
                    endpoint: endpoint.to_string(),
                    message: self.to_string(),
                }
            }
            RpcError::Api { .. } | RpcError::Decode { .. } => {
                ProviderError::Protocol(self.to_string())
            }
        }
    }
}
