/// Transport seam between the streaming session and the Live API
///
/// A transport opens one live session per call. The session talks to it
/// only through two channels, so tests can stand in an in-memory
/// transport for the WebSocket one.

use crate::network::connection::{ConnectionConfig, LiveConnection};
use crate::network::error::NetworkResult;
use crate::network::messages::{ClientMessage, ServerMessage, SetupMessage};
use crate::network::tasks::{receiver_task, sender_task};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default depth of the outbound message queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

const INBOUND_CAPACITY: usize = 256;

/// Something that happened on the inbound side of a live session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A parsed server message
    Message(ServerMessage),
    /// The remote side closed the session normally
    Closed,
    /// The session failed; no further events follow
    Failed(String),
}

/// Aborts the transport's I/O tasks when dropped
#[derive(Debug, Default)]
pub struct TaskGuard {
    tasks: Vec<JoinHandle<()>>,
}

impl TaskGuard {
    /// Track another task
    pub fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// One open live session
///
/// Dropping `outbound` lets the transport close the socket gracefully;
/// dropping the guard stops inbound delivery.
#[derive(Debug)]
pub struct LiveSession {
    /// Client messages to send
    pub outbound: mpsc::Sender<ClientMessage>,

    /// Server messages, ending with `Closed` or `Failed`
    pub inbound: mpsc::Receiver<TransportEvent>,

    /// I/O tasks owned by this session
    pub guard: TaskGuard,
}

impl LiveSession {
    /// Wrap a pair of channels with no tasks attached
    pub fn new(outbound: mpsc::Sender<ClientMessage>, inbound: mpsc::Receiver<TransportEvent>) -> Self {
        Self {
            outbound,
            inbound,
            guard: TaskGuard::default(),
        }
    }

    /// Tie a task's lifetime to this session
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.guard.push(task);
        self
    }
}

/// Opens live sessions against a remote conversational endpoint
pub trait Transport: Send + Sync + 'static {
    /// Open a session and send `setup` as its first message
    ///
    /// Resolves once the setup has been sent. The endpoint's
    /// acknowledgement arrives on `inbound` like any other message.
    ///
    /// # Errors
    /// Returns `NetworkError` if the session cannot be opened.
    fn open(&self, setup: SetupMessage) -> impl Future<Output = NetworkResult<LiveSession>> + Send;
}

/// Transport speaking the Live API over tokio-tungstenite
///
/// # Example
/// ```no_run
/// use recyclens_lib::network::{ConnectionConfig, SetupMessage, Transport, WebSocketTransport};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = WebSocketTransport::new(ConnectionConfig::from_env().unwrap());
///     let setup = SetupMessage::new("gemini-2.5-flash-native-audio-preview-09-2025", "Kore", "Hi");
///     let mut session = transport.open(setup).await.unwrap();
///
///     while let Some(event) = session.inbound.recv().await {
///         println!("{:?}", event);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: ConnectionConfig,
    outbound_capacity: usize,
}

impl WebSocketTransport {
    /// Create a transport for `config`
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    /// Change the outbound queue depth
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Connection settings in use
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    async fn open(&self, setup: SetupMessage) -> NetworkResult<LiveSession> {
        let mut connection = LiveConnection::connect(&self.config).await?;

        info!(model = %setup.model, voice = %setup.voice_name(), "Sending session setup");
        connection.send(&ClientMessage::Setup(setup)).await?;

        let (writer, reader) = connection.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
        let (event_tx, event_rx) = mpsc::channel(INBOUND_CAPACITY);

        // Finishes on its own once every outbound sender is dropped
        tokio::spawn(async move {
            match sender_task(writer, outbound_rx).await {
                Ok(()) => debug!("Sender task completed successfully"),
                Err(e) => warn!("Sender task completed with error: {}", e),
            }
        });

        let receiver = tokio::spawn(receiver_task(reader, event_tx));

        Ok(LiveSession::new(outbound_tx, event_rx).with_task(receiver))
    }
}
