//! Channel wire format.
//!
//! ```text
//! → {"id": <any>, "procedure": "echo", "input": "hi"}
//! ← {"id": <same>, "result": "hi"}
//! ← {"id": <same>, "error": {"code": "method_not_found", "message": "..."}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EdgeError;

/// An inbound call.
#[derive(Debug, Deserialize)]
pub struct CallFrame {
    #[serde(default)]
    pub id: Value,
    pub procedure: String,
    #[serde(default)]
    pub input: Value,
}

impl CallFrame {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// An outbound reply. Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct ReplyFrame {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

#[derive(Debug, Serialize)]
pub struct FrameError {
    pub code: &'static str,
    pub message: String,
}

impl ReplyFrame {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: &EdgeError) -> Self {
        Self::error(id, error.code(), error.public_message())
    }

    pub fn busy(id: Value, limit: usize) -> Self {
        Self::error(id, "busy", format!("too many calls in flight (limit {limit})"))
    }

    /// Reply to a frame that could not be parsed; there is no id to echo.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::error(Value::Null, "invalid_frame", reason.into())
    }

    fn error(id: Value, code: &'static str, message: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(FrameError { code, message }),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing Value and plain strings cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"id":null,"error":{"code":"internal_error","message":"unencodable reply"}}"#
                .to_string()
        })
    }
}
