//! How the echo channel answers a text frame.

use serde_json::Value;
use showcase_types::ServerMessage;

/// What to do with one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Send this reply to the sender.
    Reply(ServerMessage),
    /// Forward the original frame to every other connection.
    Relay,
}

/// Classify a text frame and build the response.
///
/// - `{"type":"ping"}` gets a pong with the current timestamp.
/// - `{"type":"broadcast", ...}` is relayed verbatim.
/// - Any other JSON value is echoed back wrapped with a timestamp.
/// - Anything that is not JSON gets the invalid-JSON error.
pub fn respond(text: &str) -> Response {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Response::Reply(ServerMessage::invalid_json());
    };

    match value.get("type").and_then(Value::as_str) {
        Some("ping") => Response::Reply(ServerMessage::Pong {
            timestamp: now_millis(),
        }),
        Some("broadcast") => Response::Relay,
        _ => Response::Reply(ServerMessage::Echo {
            original_message: value,
            timestamp: now_millis(),
        }),
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ping_gets_pong() {
        let before = now_millis();
        let Response::Reply(ServerMessage::Pong { timestamp }) = respond(r#"{"type":"ping"}"#) else {
            panic!("expected pong");
        };
        assert!(timestamp >= before);
    }

    #[test]
    fn broadcast_is_relayed() {
        let text = r#"{"type":"broadcast","message":"hi","sender":"a"}"#;
        assert_eq!(respond(text), Response::Relay);
    }

    #[test]
    fn other_json_is_echoed() {
        let Response::Reply(ServerMessage::Echo {
            original_message, ..
        }) = respond(r#"{"type":"hello","n":1}"#)
        else {
            panic!("expected echo");
        };
        assert_eq!(original_message, json!({"type": "hello", "n": 1}));
    }

    #[test]
    fn non_object_json_is_echoed() {
        assert!(matches!(
            respond("[1,2,3]"),
            Response::Reply(ServerMessage::Echo { .. })
        ));
        assert!(matches!(
            respond("42"),
            Response::Reply(ServerMessage::Echo { .. })
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert_eq!(
            respond("not json"),
            Response::Reply(ServerMessage::invalid_json())
        );
    }
}
