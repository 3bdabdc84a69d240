//! JSON-RPC error objects and their mapping to [`AncientError`].

use ancient_store::{AncientError, Category};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Wrong parameter count or types.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Opaque engine failure.
    pub const ENGINE_ERROR: i64 = -32000;
    /// Number is not below the frozen count.
    pub const NOT_FOUND: i64 = -32001;
    /// Append number differs from the frozen count.
    pub const OUT_OF_ORDER_APPEND: i64 = -32002;
    /// Truncate target exceeds the frozen count.
    pub const INVALID_TRUNCATE_TARGET: i64 = -32003;
    /// A hex argument could not be decoded.
    pub const MALFORMED_ENVELOPE: i64 = -32004;
    /// Category name unknown.
    pub const UNKNOWN_CATEGORY: i64 = -32005;
    /// The store is closed.
    pub const CLOSED: i64 = -32006;
    /// The request's deadline passed on the server.
    pub const DEADLINE_EXCEEDED: i64 = -32007;
    /// The request was canceled on the server.
    pub const CANCELED: i64 = -32008;
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code (see [`codes`]).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Structured fields of typed errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct NotFoundData {
    category: String,
    number: u64,
    frozen: u64,
}

#[derive(Serialize, Deserialize)]
struct OutOfOrderData {
    expected: u64,
    got: u64,
}

#[derive(Serialize, Deserialize)]
struct TruncateData {
    target: u64,
    frozen: u64,
}

#[derive(Serialize, Deserialize)]
struct ReasonData {
    reason: String,
}

impl RpcErrorObject {
    /// Creates an error object without data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }

    /// Invalid JSON.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, message)
    }

    /// Not a valid request object.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    /// Unknown method.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("the method {method} does not exist/is not available"),
        )
    }

    /// Wrong parameters.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// Builds the wire form of a store error, keeping typed fields in `data`.
    pub fn from_ancient(err: &AncientError) -> Self {
        let message = err.to_string();
        match err {
            AncientError::NotFound {
                category,
                number,
                frozen,
            } => Self::new(codes::NOT_FOUND, message).with_data(&NotFoundData {
                category: category.as_str().to_string(),
                number: *number,
                frozen: *frozen,
            }),
            AncientError::OutOfOrderAppend { expected, got } => {
                Self::new(codes::OUT_OF_ORDER_APPEND, message).with_data(&OutOfOrderData {
                    expected: *expected,
                    got: *got,
                })
            }
            AncientError::InvalidTruncateTarget { target, frozen } => {
                Self::new(codes::INVALID_TRUNCATE_TARGET, message).with_data(&TruncateData {
                    target: *target,
                    frozen: *frozen,
                })
            }
            AncientError::MalformedEnvelope(reason) => Self::new(codes::MALFORMED_ENVELOPE, message)
                .with_data(&ReasonData {
                    reason: reason.clone(),
                }),
            AncientError::UnknownCategory(name) => Self::new(codes::UNKNOWN_CATEGORY, message)
                .with_data(&ReasonData {
                    reason: name.clone(),
                }),
            AncientError::Closed => Self::new(codes::CLOSED, message),
            AncientError::DeadlineExceeded => Self::new(codes::DEADLINE_EXCEEDED, message),
            AncientError::Canceled => Self::new(codes::CANCELED, message),
            // Engine messages travel verbatim.
            AncientError::Engine(inner) => Self::new(codes::ENGINE_ERROR, inner.clone()),
            _ => Self::new(codes::ENGINE_ERROR, message),
        }
    }

    /// Rebuilds the store error a server reported.
    ///
    /// Protocol-level codes (parse, invalid request/params, unknown method)
    /// become `Protocol`; typed codes whose data is missing fall back to
    /// `Engine` with the server's message.
    pub fn into_ancient(self) -> AncientError {
        let data = self.data.clone().unwrap_or(Value::Null);
        let typed = match self.code {
            codes::NOT_FOUND => serde_json::from_value::<NotFoundData>(data)
                .ok()
                .and_then(|d| {
                    let category = d.category.parse::<Category>().ok()?;
                    Some(AncientError::NotFound {
                        category,
                        number: d.number,
                        frozen: d.frozen,
                    })
                }),
            codes::OUT_OF_ORDER_APPEND => serde_json::from_value::<OutOfOrderData>(data)
                .ok()
                .map(|d| AncientError::OutOfOrderAppend {
                    expected: d.expected,
                    got: d.got,
                }),
            codes::INVALID_TRUNCATE_TARGET => serde_json::from_value::<TruncateData>(data)
                .ok()
                .map(|d| AncientError::InvalidTruncateTarget {
                    target: d.target,
                    frozen: d.frozen,
                }),
            codes::MALFORMED_ENVELOPE => serde_json::from_value::<ReasonData>(data)
                .ok()
                .map(|d| AncientError::MalformedEnvelope(d.reason)),
            codes::UNKNOWN_CATEGORY => serde_json::from_value::<ReasonData>(data)
                .ok()
                .map(|d| AncientError::UnknownCategory(d.reason)),
            codes::CLOSED => Some(AncientError::Closed),
            codes::DEADLINE_EXCEEDED => Some(AncientError::DeadlineExceeded),
            codes::CANCELED => Some(AncientError::Canceled),
            codes::PARSE_ERROR
            | codes::INVALID_REQUEST
            | codes::METHOD_NOT_FOUND
            | codes::INVALID_PARAMS => Some(AncientError::Protocol(format!(
                "{} (code {})",
                self.message, self.code
            ))),
            _ => None,
        };
        typed.unwrap_or(AncientError::Engine(self.message))
    }
}
