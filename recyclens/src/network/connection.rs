/// WebSocket connection to the Gemini Live API
///
/// Opens the `BidiGenerateContent` socket and hands out its halves to the
/// sender and receiver tasks.

use crate::network::error::{NetworkError, NetworkResult};
use crate::network::messages::ClientMessage;
use crate::network::tls::native_roots_connector;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the WebSocket stream
pub type WsWriter = SplitSink<WsStream, Message>;

/// Read half of the WebSocket stream
pub type WsReader = SplitStream<WsStream>;

/// Default Live API host
pub const DEFAULT_HOST: &str = "generativelanguage.googleapis.com";

/// Default Live API version
pub const DEFAULT_API_VERSION: &str = "v1beta";

/// Environment variables consulted for the API key, in order
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Configuration for the Live API connection
///
/// # Example
/// ```
/// use recyclens_lib::network::ConnectionConfig;
///
/// let config = ConnectionConfig::new("test-key").with_timeout(5000);
/// let url = config.build_url().unwrap();
///
/// assert!(url.starts_with("wss://generativelanguage.googleapis.com/ws/"));
/// assert!(url.ends_with("?key=test-key"));
/// ```
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Host name of the endpoint
    pub host: String,

    /// API version segment of the service path
    pub api_version: String,

    /// API key sent as the `key` query parameter
    pub api_key: String,

    /// Optional handshake timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Create a configuration for the public endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: api_key.into(),
            timeout_ms: None,
        }
    }

    /// Read the API key from `GEMINI_API_KEY`, falling back to `API_KEY`
    ///
    /// # Errors
    /// Returns `NetworkError::InvalidConfig` if neither variable is set.
    pub fn from_env() -> NetworkResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NetworkResult<Self> {
        API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|key| !key.trim().is_empty())
            .map(|key| Self::new(key.trim()))
            .ok_or_else(|| {
                NetworkError::InvalidConfig(format!(
                    "no API key found in {}",
                    API_KEY_VARS.join(" or ")
                ))
            })
    }

    /// Use a different host (e.g. a local proxy)
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Use a different API version
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Bound the WebSocket handshake
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Build the WebSocket URL
    ///
    /// # Errors
    /// Returns `NetworkError::InvalidConfig` if the key or host is empty.
    pub fn build_url(&self) -> NetworkResult<String> {
        if self.api_key.is_empty() {
            return Err(NetworkError::InvalidConfig("API key is empty".to_string()));
        }
        if self.host.is_empty() {
            return Err(NetworkError::InvalidConfig("host is empty".to_string()));
        }

        Ok(format!(
            "wss://{}/ws/google.ai.generativelanguage.{}.GenerativeService.BidiGenerateContent?key={}",
            self.host, self.api_version, self.api_key
        ))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("api_version", &self.api_version)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// An open Live API WebSocket
#[derive(Debug)]
pub struct LiveConnection {
    ws_stream: WsStream,
}

impl LiveConnection {
    /// Open the socket
    ///
    /// # Errors
    /// Returns `NetworkError` if the URL is invalid, the handshake times out,
    /// or the server rejects the upgrade.
    pub async fn connect(config: &ConnectionConfig) -> NetworkResult<Self> {
        info!(host = %config.host, "Connecting to Live API");

        let url = config.build_url()?;
        let request = url
            .as_str()
            .into_client_request()
            .map_err(|e| NetworkError::HttpError(e.to_string()))?;

        let connector = native_roots_connector()?;
        let connect_future = connect_async_tls_with_config(request, None, false, Some(connector));
        let result = match config.timeout_ms {
            Some(timeout_ms) => {
                tokio::time::timeout(tokio::time::Duration::from_millis(timeout_ms), connect_future)
                    .await
                    .map_err(|_| NetworkError::Timeout(timeout_ms))?
            }
            None => connect_future.await,
        };

        let (ws_stream, response) = result.map_err(|e| {
            if let tokio_tungstenite::tungstenite::Error::Http(resp) = &e {
                if resp.status() == 401 || resp.status() == 403 {
                    return NetworkError::AuthenticationFailed;
                }
            }
            NetworkError::ConnectionFailed(e.to_string())
        })?;

        info!("Connected to Live API (status: {})", response.status());
        debug!("Response headers: {:?}", response.headers());

        Ok(Self { ws_stream })
    }

    /// Serialize and send one client message
    ///
    /// # Errors
    /// Returns `NetworkError` if serialization or sending fails
    pub async fn send(&mut self, message: &ClientMessage) -> NetworkResult<()> {
        let json = serde_json::to_string(message)?;
        debug!("Sending {} message ({} bytes)", message.kind(), json.len());

        self.ws_stream.send(Message::Text(json.into())).await?;

        Ok(())
    }

    /// Split the connection into separate write and read halves
    pub fn split(self) -> (WsWriter, WsReader) {
        self.ws_stream.split()
    }
}
