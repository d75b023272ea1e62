/// Network communication and WebSocket handling
///
/// This module provides types and utilities for streaming media to the
/// Gemini Live API and receiving spoken replies.

/// WebSocket connection management
pub mod connection;

/// Network error types
pub mod error;

/// Live API message type definitions
pub mod messages;

/// Async tasks for concurrent send/receive operations
pub mod tasks;

/// TLS client configuration
pub mod tls;

/// Transport seam used by the streaming session
pub mod transport;

// Re-export commonly used types
pub use connection::{ConnectionConfig, LiveConnection, WsReader, WsWriter};
pub use error::{NetworkError, NetworkResult};
pub use messages::{ClientMessage, MediaBlob, ServerMessage, SetupMessage};
pub use transport::{LiveSession, TaskGuard, Transport, TransportEvent, WebSocketTransport};
