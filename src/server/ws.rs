//! WebSocket transport and HTTP side routes.
//!
//! Routes:
//!
//! - `GET /` — name and version
//! - `GET /info` — the server-info document
//! - `GET /health` — editor connectivity
//! - `GET /operations` — the fixed operation enumeration
//! - `GET /mcp` — the WebSocket endpoint
//!
//! The `/mcp` upgrade checks the `X-API-Key` header when a key is
//! configured; the default bind address is localhost only.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::ops::Operation;
use crate::server::message::{parse_client_message, ClientMessage, Envelope};
use crate::server::rpc::RequestId;
use crate::server::{server_info, ServerState, SERVER_DISPLAY_NAME};

/// Builds the router with CORS configured from the allow-list.
pub fn router(state: ServerState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    Router::new()
        .route("/", get(root))
        .route("/info", get(info))
        .route("/health", get(health))
        .route("/operations", get(operations))
        .route("/mcp", get(mcp_upgrade))
        .layer(cors)
        .with_state(state)
}

/// Binds the listener and serves until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the bind or the accept loop fails.
pub async fn serve(state: ServerState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "WebSocket MCP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::error!("failed to install signal handlers");
        return std::future::pending().await;
    };

    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")])
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": format!("{SERVER_DISPLAY_NAME} Server"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn info(State(state): State<ServerState>) -> Json<Value> {
    Json(server_info(&state.config))
}

async fn health(State(state): State<ServerState>) -> Json<Value> {
    let connected = state.session.lock().await.connected();
    Json(json!({
        "status": if connected { "healthy" } else { "unhealthy" },
        "resolve_connected": connected,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn operations() -> Json<Value> {
    let names: Vec<&str> = Operation::ALL.iter().map(|op| op.name()).collect();
    Json(json!({ "operations": names }))
}

async fn mcp_upgrade(
    State(state): State<ServerState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(expected) = &state.config.server.api_key {
        let presented = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            tracing::warn!("rejected connection with missing or invalid API key");
            return (StatusCode::UNAUTHORIZED, "Invalid API key").into_response();
        }
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServerState) {
    tracing::info!("client connected");

    let greeting = Envelope::server_info(server_info(&state.config));
    if send_envelope(&mut socket, &greeting).await.is_err() {
        return;
    }

    while let Some(received) = socket.recv().await {
        let message = match received {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "WebSocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let (reply, close_after) = handle_frame(&state, text.as_str()).await;
                if send_envelope(&mut socket, &reply).await.is_err() {
                    break;
                }
                if close_after {
                    break;
                }
            }
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; transport-level
            // ping/pong is handled by the WebSocket layer itself.
            _ => {}
        }
    }

    tracing::info!("client disconnected");
}

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(envelope) {
        Ok(json) => json,
        Err(error) => {
            tracing::error!(%error, "failed to serialise envelope");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

/// Handles one text frame, returning the reply envelope and whether the
/// connection should close afterwards.
async fn handle_frame(state: &ServerState, text: &str) -> (Envelope, bool) {
    tracing::debug!(frame = text, "received message");
    match parse_client_message(text) {
        Err(error) => (error, false),
        Ok(ClientMessage::Ping { id, timestamp }) => (Envelope::pong(id, timestamp), false),
        Ok(ClientMessage::Close { id }) => (Envelope::close_ack(id), true),
        Ok(ClientMessage::Request {
            id,
            operation,
            data,
        }) => (dispatch_request(state, id, operation, &data).await, false),
    }
}

/// Dispatches one operation and wraps the outcome in an envelope. Every
/// envelope, success or error, carries the current capability map.
pub(crate) async fn dispatch_request(
    state: &ServerState,
    id: RequestId,
    operation: String,
    data: &Value,
) -> Envelope {
    let mut session = state.session.lock().await;
    let result = session.dispatch_named(&operation, data);
    let capabilities = session.capabilities().to_value();
    drop(session);

    match result {
        Ok(value) => {
            let mut data = match value {
                Value::Object(map) => Value::Object(map),
                other => json!({ "result": other }),
            };
            data["api_capabilities"] = capabilities;
            Envelope::response(id, operation, data)
        }
        Err(error) => {
            tracing::error!(%operation, %error, "operation failed");
            Envelope::error(
                Some(id),
                Some(operation),
                json!({
                    "message": error.to_string(),
                    "api_capabilities": capabilities,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::sim::SimulatedEditor;
    use crate::ops::Session;
    use crate::server::message::MessageType;

    fn demo_state() -> ServerState {
        let session = Session::new(Some(SimulatedEditor::with_demo_project()), false);
        ServerState::new(session, Config::default())
    }

    #[tokio::test]
    async fn response_envelope_carries_capabilities() {
        let state = demo_state();
        let envelope = dispatch_request(
            &state,
            RequestId::Number(1),
            "get_projects".to_string(),
            &json!({}),
        )
        .await;
        assert_eq!(envelope.kind, MessageType::Response);
        let data = envelope.data.unwrap();
        assert_eq!(data["projects"][0], "Demo Project");
        assert_eq!(data["api_capabilities"]["get_project_list"], true);
    }

    #[tokio::test]
    async fn error_envelope_carries_capabilities() {
        let session = Session::new(Some(SimulatedEditor::empty()), false);
        let state = ServerState::new(session, Config::default());
        let envelope = dispatch_request(
            &state,
            RequestId::Number(2),
            "get_project_info".to_string(),
            &json!({}),
        )
        .await;
        assert_eq!(envelope.kind, MessageType::Error);
        let data = envelope.data.unwrap();
        assert!(data["message"].as_str().unwrap().contains("No project"));
        assert!(data["api_capabilities"].is_object());
    }

    #[tokio::test]
    async fn unknown_operation_yields_error_envelope() {
        let state = demo_state();
        let envelope = dispatch_request(
            &state,
            RequestId::Number(3),
            "defragment_timeline".to_string(),
            &json!({}),
        )
        .await;
        assert_eq!(envelope.kind, MessageType::Error);
        assert!(envelope.data.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("Unsupported operation"));
    }

    #[tokio::test]
    async fn frame_flow_ping_and_close() {
        let state = demo_state();
        let (pong, close) =
            handle_frame(&state, r#"{"id": 1, "type": "ping", "data": {"timestamp": 7}}"#).await;
        assert_eq!(pong.kind, MessageType::Pong);
        assert!(!close);
        assert_eq!(pong.data.unwrap()["timestamp"], 7);

        let (ack, close) = handle_frame(&state, r#"{"id": 2, "type": "close"}"#).await;
        assert_eq!(ack.kind, MessageType::CloseAck);
        assert!(close);
    }
}
