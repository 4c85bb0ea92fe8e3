//! Messages the echo channel server sends back to clients.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error text returned for frames that are not valid JSON.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON format";

/// A reply produced by the echo channel for a structured text frame.
///
/// Broadcast frames are relayed verbatim and have no reply variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Reply to `{"type":"ping"}`.
    Pong {
        /// Milliseconds since the Unix epoch.
        timestamp: i64,
    },
    /// Any other JSON value, wrapped and sent back.
    Echo {
        /// The value the client sent.
        #[serde(rename = "originalMessage")]
        original_message: serde_json::Value,
        /// Milliseconds since the Unix epoch.
        timestamp: i64,
    },
    /// The frame could not be processed.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// The reply for a frame that failed to parse as JSON.
    pub fn invalid_json() -> Self {
        Self::Error {
            message: INVALID_JSON_MESSAGE.to_owned(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pong_serializes_with_type_tag() {
        let json = serde_json::to_value(ServerMessage::Pong { timestamp: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong", "timestamp": 7}));
    }

    #[test]
    fn echo_uses_camel_case_original_message() {
        let msg = ServerMessage::Echo {
            original_message: serde_json::json!({"type": "hello"}),
            timestamp: 1,
        };
        let json = serde_json::to_value(msg).unwrap();
        assert_eq!(json["type"], "echo");
        assert_eq!(json["originalMessage"]["type"], "hello");
    }

    #[test]
    fn invalid_json_error_text() {
        let json = serde_json::to_value(ServerMessage::invalid_json()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "error", "message": "Invalid JSON format"})
        );
    }
}
