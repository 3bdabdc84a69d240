//! JSON-RPC request and response messages.

use crate::errors::RpcErrorObject;
use ancient_store::{AncientError, AncientResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// JSON-RPC protocol version carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request ID echoed by the response.
    pub id: u64,
    /// Namespace-qualified method name.
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
    /// Milliseconds left before the caller gives up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl RpcRequest {
    /// Creates a new request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
            deadline_ms: None,
        }
    }

    /// Attaches the caller's remaining time budget.
    #[must_use]
    pub fn with_remaining(mut self, remaining: Option<Duration>) -> Self {
        self.deadline_ms =
            remaining.map(|left| u64::try_from(left.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Encodes to a single JSON line (without the terminator).
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// ID of the request; null if the request could not be parsed.
    pub id: Option<u64>,
    /// Result value. Present on success; a failed `ancient` also carries
    /// the empty envelope here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error, if the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// Creates a successful response.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failed response.
    pub fn failure(id: Option<u64>, error: RpcErrorObject, placeholder: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: placeholder,
            error: Some(error),
        }
    }

    /// Returns true if the response carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Converts into the call outcome. The error wins over any result.
    pub fn into_result(self) -> AncientResult<Value> {
        match self.error {
            Some(error) => Err(error.into_ancient()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Encodes to a single JSON line (without the terminator).
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> AncientResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| AncientError::Protocol(format!("failed to decode response: {e}")))
    }
}
