/// Audio capture, codec and playback
pub mod audio;

/// Session configuration
pub mod config;

/// Video sources and frame sampling
pub mod media;

/// Live API transport
pub mod network;

/// Streaming session orchestration
pub mod session;

/// Connection state and event sink
pub mod state;

/// Utility modules
pub mod utils;

pub use config::SessionConfig;
pub use session::{SessionError, SessionResult, StreamingSession};
pub use state::ConnectionState;
