//! WebSocket message envelope.
//!
//! Every frame on the `/mcp` socket is a JSON object of shape
//! `{id, type, operation, data}`. The `type` field selects the flow:
//!
//! - **request** → **response** / **error**: operation dispatch
//! - **ping** → **pong**: keep-alive, echoing the client timestamp
//! - **close** → **close_ack**: orderly shutdown of the connection
//! - **server_info**: pushed by the server on connect
//!
//! Malformed frames are answered with an error envelope rather than
//! dropping the connection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::rpc::RequestId;

/// Message kinds carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    Error,
    Ping,
    Pong,
    Close,
    CloseAck,
    ServerInfo,
}

/// An outgoing message envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Echoed client message id, absent for connection-level messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// The message kind.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// The operation this message answers, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// The message payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// A successful operation response.
    #[must_use]
    pub fn response(id: RequestId, operation: impl Into<String>, data: Value) -> Self {
        Self {
            id: Some(id),
            kind: MessageType::Response,
            operation: Some(operation.into()),
            data: Some(data),
        }
    }

    /// An error envelope; `id` and `operation` are echoed when known.
    #[must_use]
    pub fn error(id: Option<RequestId>, operation: Option<String>, data: Value) -> Self {
        Self {
            id,
            kind: MessageType::Error,
            operation,
            data: Some(data),
        }
    }

    /// A pong answering a ping, echoing the client timestamp.
    #[must_use]
    pub fn pong(id: RequestId, timestamp: Option<Value>) -> Self {
        Self {
            id: Some(id),
            kind: MessageType::Pong,
            operation: None,
            data: Some(json!({ "timestamp": timestamp })),
        }
    }

    /// Acknowledges a close request.
    #[must_use]
    pub const fn close_ack(id: RequestId) -> Self {
        Self {
            id: Some(id),
            kind: MessageType::CloseAck,
            operation: None,
            data: None,
        }
    }

    /// The server-info message pushed on connect.
    #[must_use]
    pub const fn server_info(data: Value) -> Self {
        Self {
            id: None,
            kind: MessageType::ServerInfo,
            operation: None,
            data: Some(data),
        }
    }
}

/// A validated incoming client message.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// An operation request.
    Request {
        id: RequestId,
        operation: String,
        data: Value,
    },
    /// A keep-alive ping.
    Ping {
        id: RequestId,
        timestamp: Option<Value>,
    },
    /// The client wants to close the connection.
    Close { id: RequestId },
}

fn structure_error(message: &str) -> Envelope {
    Envelope::error(None, None, json!({ "message": message }))
}

/// Parses one text frame into a client message.
///
/// # Errors
///
/// Returns the error envelope to send back when the frame is malformed.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, Envelope> {
    let value: Value = serde_json::from_str(text)
        .map_err(|_| structure_error("Invalid message: not valid JSON"))?;

    let Some(object) = value.as_object() else {
        return Err(structure_error("Invalid message: not a JSON object"));
    };

    if !object.contains_key("id") || !object.contains_key("type") {
        return Err(structure_error(
            "Invalid message structure. Must include 'id' and 'type'.",
        ));
    }

    let id: RequestId = serde_json::from_value(object["id"].clone())
        .map_err(|_| structure_error("Invalid message: 'id' must be a string or number"))?;

    let Some(kind) = object.get("type").and_then(Value::as_str) else {
        return Err(structure_error("Invalid message: 'type' must be a string"));
    };

    match kind {
        "request" => {
            let (Some(operation), Some(data)) = (
                object.get("operation").and_then(Value::as_str),
                object.get("data"),
            ) else {
                return Err(Envelope::error(
                    Some(id),
                    None,
                    json!({
                        "message": "Invalid request structure. Must include 'operation' and 'data'."
                    }),
                ));
            };
            Ok(ClientMessage::Request {
                id,
                operation: operation.to_string(),
                data: data.clone(),
            })
        }
        "ping" => {
            let timestamp = object
                .get("data")
                .and_then(|data| data.get("timestamp"))
                .cloned();
            Ok(ClientMessage::Ping { id, timestamp })
        }
        "close" => Ok(ClientMessage::Close { id }),
        other => Err(Envelope::error(
            Some(id),
            None,
            json!({ "message": format!("Unknown message type: {other}") }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_request() {
        let msg = parse_client_message(
            r#"{"id": 1, "type": "request", "operation": "get_projects", "data": {}}"#,
        )
        .unwrap();
        let ClientMessage::Request { id, operation, .. } = msg else {
            panic!("expected request");
        };
        assert_eq!(id, RequestId::Number(1));
        assert_eq!(operation, "get_projects");
    }

    #[test]
    fn parse_string_id() {
        let msg =
            parse_client_message(r#"{"id": "req-7", "type": "ping"}"#).unwrap();
        let ClientMessage::Ping { id, .. } = msg else {
            panic!("expected ping");
        };
        assert_eq!(id, RequestId::String("req-7".to_string()));
    }

    #[test]
    fn missing_id_or_type_is_rejected() {
        let err = parse_client_message(r#"{"type": "request"}"#).unwrap_err();
        assert_eq!(err.kind, MessageType::Error);
        assert!(err.data.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("'id' and 'type'"));
    }

    #[test]
    fn request_without_operation_is_rejected_with_id() {
        let err = parse_client_message(r#"{"id": 3, "type": "request"}"#).unwrap_err();
        assert_eq!(err.id, Some(RequestId::Number(3)));
        assert!(err.data.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("'operation' and 'data'"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse_client_message(r#"{"id": 4, "type": "subscribe"}"#).unwrap_err();
        assert!(err.data.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("Unknown message type: subscribe"));
    }

    #[test]
    fn invalid_json_is_rejected_without_id() {
        let err = parse_client_message("not json").unwrap_err();
        assert_eq!(err.id, None);
    }

    #[test]
    fn ping_echoes_timestamp() {
        let msg = parse_client_message(
            r#"{"id": 9, "type": "ping", "data": {"timestamp": 1720000000}}"#,
        )
        .unwrap();
        let ClientMessage::Ping { timestamp, .. } = msg else {
            panic!("expected ping");
        };
        assert_eq!(timestamp, Some(serde_json::json!(1_720_000_000)));
    }

    #[test]
    fn envelope_serialises_without_null_fields() {
        let envelope = Envelope::close_ack(RequestId::Number(2));
        let text = serde_json::to_string(&envelope).unwrap();
        assert_eq!(text, r#"{"id":2,"type":"close_ack"}"#);
    }

    #[test]
    fn message_type_serialises_snake_case() {
        assert_eq!(
            serde_json::to_string(&MessageType::ServerInfo).unwrap(),
            r#""server_info""#
        );
    }
}
