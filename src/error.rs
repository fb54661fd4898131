//! Error types for the Todo MCP server and client
//!
//! This module defines the error hierarchy for all operations in the crate.

use thiserror::Error;

use crate::mcp::router::RouteKind;
use crate::mcp::types::{JsonRpcError, RequestId};

/// Main error type for the Todo MCP crate
#[derive(Error, Debug)]
pub enum TodoMcpError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Framing errors (malformed records)
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Route registration/resolution errors
    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    /// Transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Client session errors
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// A record that cannot be decoded into a request or response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },
}

impl CodecError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        CodecError::MalformedMessage {
            reason: reason.into(),
        }
    }
}

/// Route registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("{kind} route '{pattern}' overlaps existing route '{existing}'")]
    DuplicateRoute {
        kind: RouteKind,
        pattern: String,
        existing: String,
    },

    #[error("Invalid {kind} pattern '{pattern}': {message}")]
    InvalidPattern {
        kind: RouteKind,
        pattern: String,
        message: String,
    },

    #[error("No {kind} route found for '{target}'")]
    NoRouteFound { kind: RouteKind, target: String },
}

/// Errors raised by a route handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

/// Byte channel errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Channel closed by peer")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client session errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Server error: {}", .0.message)]
    RemoteError(JsonRpcError),

    #[error("Response ID mismatch: expected {expected}, got {actual}")]
    ProtocolDesync {
        expected: RequestId,
        actual: RequestId,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Session not initialized - call initialize() first")]
    NotInitialized,

    #[error("Session closed after an earlier connection failure")]
    SessionClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the session is unusable after this error
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ClientError::RemoteError(_) | ClientError::NotInitialized | ClientError::Json(_)
        )
    }
}

/// Result type alias for Todo MCP operations
pub type Result<T> = std::result::Result<T, TodoMcpError>;
