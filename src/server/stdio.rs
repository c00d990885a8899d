//! stdio transport.
//!
//! For clients that launch the shim as a subprocess:
//!
//! - Messages are UTF-8 encoded JSON-RPC 2.0
//! - Messages are delimited by newlines and must not contain embedded
//!   newlines
//! - stdin receives requests, stdout carries responses
//! - stderr is reserved for logging

use std::io;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::ops::{OpError, Operation, Session};
use crate::server::rpc::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData, JsonRpcRequest,
    JsonRpcResponse,
};

/// Newline-delimited JSON-RPC over stdin/stdout.
pub struct StdioTransport {
    /// Buffered reader for stdin.
    reader: BufReader<tokio::io::Stdin>,
    /// Handle for stdout.
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    /// Creates a new stdio transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next message line from stdin.
    ///
    /// Returns `None` if stdin is closed (EOF).
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes a JSON-RPC response to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_raw(&json).await
    }

    /// Writes a JSON-RPC error to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_error(&mut self, error: &JsonRpcError) -> io::Result<()> {
        let json = serde_json::to_string(error)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_raw(&json).await
    }

    /// Writes a raw JSON string to stdout with newline termination.
    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        // Messages must not contain embedded newlines.
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves JSON-RPC over stdio until EOF or a shutdown signal.
///
/// # Errors
///
/// Returns an error if transport I/O fails.
pub async fn serve(session: Arc<Mutex<Session>>) -> io::Result<()> {
    let mut transport = StdioTransport::new();
    serve_with_shutdown(&session, &mut transport).await
}

#[cfg(unix)]
async fn serve_with_shutdown(
    session: &Arc<Mutex<Session>>,
    transport: &mut StdioTransport,
) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
                return Ok(());
            }

            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
                return Ok(());
            }

            line_result = transport.read_line() => {
                let Some(line) = line_result? else {
                    tracing::info!("stdin closed, shutting down");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                handle_line(session, transport, &line).await?;
            }
        }
    }
}

#[cfg(not(unix))]
async fn serve_with_shutdown(
    session: &Arc<Mutex<Session>>,
    transport: &mut StdioTransport,
) -> io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                return Ok(());
            }

            line_result = transport.read_line() => {
                let Some(line) = line_result? else {
                    tracing::info!("stdin closed, shutting down");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                handle_line(session, transport, &line).await?;
            }
        }
    }
}

async fn handle_line(
    session: &Arc<Mutex<Session>>,
    transport: &mut StdioTransport,
    line: &str,
) -> io::Result<()> {
    match parse_message(line) {
        Err(error) => transport.write_error(&error).await,
        Ok(IncomingMessage::Notification(notification)) => {
            tracing::debug!(method = %notification.method, "ignoring notification");
            Ok(())
        }
        Ok(IncomingMessage::Request(request)) => {
            match handle_request(session, request).await {
                Ok(response) => transport.write_response(&response).await,
                Err(error) => transport.write_error(&error).await,
            }
        }
    }
}

/// Dispatches one JSON-RPC request. The result object (and error data)
/// carries the capability map, matching the WebSocket envelopes.
pub(crate) async fn handle_request(
    session: &Arc<Mutex<Session>>,
    request: JsonRpcRequest,
) -> Result<JsonRpcResponse, JsonRpcError> {
    if Operation::parse(&request.method).is_none() {
        return Err(JsonRpcError::method_not_found(request.id, &request.method));
    }

    let params = request.params.unwrap_or_else(|| json!({}));
    let mut session = session.lock().await;
    let result = session.dispatch_named(&request.method, &params);
    let capabilities = session.capabilities().to_value();
    drop(session);

    match result {
        Ok(value) => {
            let mut data = match value {
                Value::Object(map) => Value::Object(map),
                other => json!({ "result": other }),
            };
            data["api_capabilities"] = capabilities;
            Ok(JsonRpcResponse::success(request.id, data))
        }
        Err(OpError::InvalidRequest(message)) => {
            Err(JsonRpcError::invalid_params(request.id, message))
        }
        Err(error) => Err(JsonRpcError::new(
            Some(request.id),
            JsonRpcErrorData::with_message(ErrorCode::ServerError(-32000), error.to_string())
                .with_data(json!({ "api_capabilities": capabilities })),
        )),
    }
}
