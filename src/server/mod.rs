//! Transports.
//!
//! Two transports share the same [`crate::ops::Session`]:
//!
//! - [`ws`] — the WebSocket endpoint at `/mcp` plus HTTP side routes,
//!   speaking `{id, type, operation, data}` envelopes ([`message`])
//! - [`stdio`] — newline-delimited JSON-RPC 2.0 ([`rpc`]) for clients that
//!   launch the shim as a subprocess
//!
//! The session sits behind an async mutex, so operations from every
//! connection dispatch one at a time; the editor's scripting binding is not
//! documented as thread-safe and never sees concurrent calls.

pub mod message;
pub mod rpc;
pub mod stdio;
pub mod ws;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::ops::Session;

/// Display name advertised in server info.
pub const SERVER_DISPLAY_NAME: &str = "DaVinci Resolve MCP";

/// Shared state behind every transport.
#[derive(Clone)]
pub struct ServerState {
    /// The dispatch session; all editor calls serialise through this lock.
    pub session: Arc<Mutex<Session>>,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl ServerState {
    /// Bundles a session and configuration for the transports.
    #[must_use]
    pub fn new(session: Session, config: Config) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            config: Arc::new(config),
        }
    }
}

/// The server-info document pushed to WebSocket clients on connect and
/// served at `/info`.
#[must_use]
pub fn server_info(config: &Config) -> Value {
    let authenticated = config.server.api_key.is_some();
    json!({
        "name": SERVER_DISPLAY_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "MCP server for DaVinci Resolve integration",
        "authentication": {
            "type": if authenticated { "api_key" } else { "none" },
            "api_key_location": if authenticated { Some("header") } else { None },
            "api_key_name": if authenticated { Some("X-API-Key") } else { None },
        },
        "capabilities": {
            "read_projects": true,
            "modify_projects": true,
            "read_timeline": true,
            "modify_timeline": true,
            "read_media": true,
            "render_export": true,
            "color_grading": true,
        },
    })
}
