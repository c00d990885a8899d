//! resolve-mcp: MCP server exposing DaVinci Resolve's scripting object
//! model to AI assistants.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use resolve_mcp::config;
use resolve_mcp::host::{self, HostMode};
use resolve_mcp::ops::Session;
use resolve_mcp::server::{stdio, ws, ServerState};

/// MCP server for DaVinci Resolve.
///
/// Exposes project, timeline, media pool, colour node and render queue
/// operations to AI assistants over WebSocket or stdio.
#[derive(Parser, Debug)]
#[command(name = "resolve-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Serve JSON-RPC over stdio instead of the WebSocket endpoint
    #[arg(long)]
    stdio: bool,

    /// Use the in-memory simulated editor instead of the live binding
    #[arg(long)]
    simulate: bool,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs always go to stderr; stdout belongs to the stdio transport.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the resolve-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting resolve-mcp server"
    );

    let mode = if args.simulate || cfg.editor.simulate {
        HostMode::Simulated
    } else {
        HostMode::Live
    };

    let editor = match host::connect(mode) {
        Ok(editor) => {
            info!("Connected to editor host");
            Some(editor)
        }
        Err(e) => {
            warn!(error = %e, "Not connected to DaVinci Resolve; operations will report errors until it is reachable");
            None
        }
    };

    let session = Session::new(editor, cfg.editor.auto_open_project);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = if args.stdio {
        info!("Serving JSON-RPC over stdio");
        let state = ServerState::new(session, cfg);
        runtime.block_on(stdio::serve(state.session))
    } else {
        let addr: SocketAddr = match format!("{}:{}", cfg.server.host, cfg.server.port).parse() {
            Ok(addr) => addr,
            Err(e) => {
                error!(host = %cfg.server.host, port = cfg.server.port, error = %e, "Invalid bind address");
                return ExitCode::FAILURE;
            }
        };
        let state = ServerState::new(session, cfg);
        runtime.block_on(ws::serve(state, addr))
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, true, "debug"), Level::ERROR);
        assert_eq!(get_log_level(2, false, "warn"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "info"), Level::INFO);
        assert_eq!(get_log_level(0, false, "nonsense"), Level::WARN);
    }
}
