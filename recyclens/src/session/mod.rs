//! RecycLens 流式会话模块
//!
//! 将麦克风音频与摄像头画面实时发送到 Live API，并播放模型的语音回复
//!
//! # 功能
//!
//! - 统一的连接生命周期（Disconnected -> Connecting -> Connected）
//! - 麦克风采集、抽帧、下行播放三个并发生产者
//! - 任意阶段失败都会完整释放已获取的资源
//! - 状态与音量只通过构造时传入的两个回调报告
//!
//! # 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use recyclens_lib::config::SessionConfig;
//! use recyclens_lib::media::StillImageSource;
//! use recyclens_lib::network::ConnectionConfig;
//! use recyclens_lib::session::StreamingSession;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let session = StreamingSession::with_default_backends(
//!     SessionConfig::default(),
//!     ConnectionConfig::from_env()?,
//!     Arc::new(|state| println!("state: {state}")),
//!     Arc::new(|level, is_output| println!("volume {level:.2} output={is_output}")),
//! )?;
//!
//! let camera = Arc::new(StillImageSource::open("bottle.jpg")?);
//! session.connect(camera).await?;
//!
//! // ...
//!
//! session.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! # 工作流程
//!
//! ```text
//! 1. connect()
//!    └── State: Disconnected/Error -> Connecting
//!
//! 2. 打开扬声器、麦克风，建立网络会话并发送 setup
//!
//! 3. 收到 setupComplete
//!    └── State: Connecting -> Connected
//!    └── 启动采集循环、抽帧任务、下行循环
//!
//! 4. 远端关闭 / 传输失败
//!    └── 释放全部资源
//!    └── State: Connected -> Disconnected / Error
//!
//! 5. disconnect()
//!    └── 释放全部资源
//!    └── State: * -> Disconnected
//! ```

mod error;
mod shared;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::audio::{CpalMicrophone, CpalSpeaker, InputPipeline, Microphone, Speaker};
use crate::config::SessionConfig;
use crate::media::{FrameSampler, MediaAccessError, VideoSource};
use crate::network::{
    ClientMessage, ConnectionConfig, LiveSession, NetworkError, Transport, TransportEvent,
    WebSocketTransport,
};
use crate::state::{ConnectionState, EventSink, StateCallback, VolumeCallback};

pub use error::{SessionError, SessionResult};

use shared::{forward_block, run_inbound, Shared};

/// 原始麦克风数据队列容量
const RAW_AUDIO_CAPACITY: usize = 64;

/// 流式会话
///
/// 每个逻辑应用会话构造一个实例，同一时刻最多只有一个活动连接。
/// 所有方法都只需要 `&self`，`disconnect()` 可以与进行中的 `connect()` 并发调用。
///
/// 回调在内部锁内同步执行，不得在回调中直接调用本会话的方法
/// （`state()` 与 `is_active()` 除外）。
pub struct StreamingSession<T: Transport, M: Microphone, S: Speaker> {
    config: SessionConfig,
    transport: T,
    microphone: Arc<M>,
    speaker: Arc<S>,
    shared: Arc<Shared>,
}

impl StreamingSession<WebSocketTransport, CpalMicrophone, CpalSpeaker> {
    /// 使用 WebSocket 传输与 cpal 音频设备创建会话
    ///
    /// # Errors
    ///
    /// 配置无效时返回 [`SessionError::Config`]
    pub fn with_default_backends(
        config: SessionConfig,
        connection: ConnectionConfig,
        on_state: StateCallback,
        on_volume: VolumeCallback,
    ) -> SessionResult<Self> {
        let transport =
            WebSocketTransport::new(connection).with_outbound_capacity(config.audio.outbound_capacity);
        let microphone = CpalMicrophone::new(config.audio.input_device.clone());
        let speaker = CpalSpeaker::new(config.audio.output_device.clone());

        Self::new(config, transport, microphone, speaker, on_state, on_volume)
    }
}

impl<T: Transport, M: Microphone, S: Speaker> StreamingSession<T, M, S> {
    /// 创建会话，初始状态为 Disconnected，不发出回调
    ///
    /// # Errors
    ///
    /// 配置无效时返回 [`SessionError::Config`]
    pub fn new(
        config: SessionConfig,
        transport: T,
        microphone: M,
        speaker: S,
        on_state: StateCallback,
        on_volume: VolumeCallback,
    ) -> SessionResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            transport,
            microphone: Arc::new(microphone),
            speaker: Arc::new(speaker),
            shared: Arc::new(Shared::new(EventSink::new(on_state, on_volume))),
        })
    }

    /// 获取当前状态
    pub fn state(&self) -> ConnectionState {
        self.shared.sink.current()
    }

    /// 是否处于 Connecting 或 Connected
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// 获取会话配置
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 建立会话
    ///
    /// 在会话打开（收到 `setupComplete`）或连接失败后返回。
    ///
    /// # Errors
    ///
    /// - `SessionError::AlreadyActive` - 已在连接或已连接，不改变状态
    /// - `SessionError::MediaAccess` - 麦克风或扬声器无法获取，状态变为 Error
    /// - `SessionError::Transport` - 网络会话无法建立，状态变为 Error
    /// - `SessionError::Cancelled` - 期间调用了 `disconnect()`
    pub async fn connect(&self, video: Arc<dyn VideoSource>) -> SessionResult<()> {
        let generation = self
            .shared
            .sink
            .begin()
            .map_err(|_| SessionError::AlreadyActive)?;

        info!(generation, model = %self.config.model, "Connecting streaming session");
        self.shared.scheduler.reset();

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        self.shared.stash(generation, |r| r.set_cancel(cancel_tx))?;

        match self.establish(generation, video, &mut cancel_rx).await {
            Ok(()) => {
                info!(generation, "Streaming session connected");
                Ok(())
            }
            Err(SessionError::Cancelled) => {
                info!(generation, "Connect cancelled");
                Err(SessionError::Cancelled)
            }
            Err(e) => Err(self.fail(generation, e)),
        }
    }

    /// 断开会话
    ///
    /// 幂等：可以在任何状态、任何线程多次调用。返回后不再有回调触发，
    /// 直到下一次 `connect()`。
    pub fn disconnect(&self) {
        if self.shared.sink.disconnect() {
            info!("Disconnecting streaming session");
        }
        self.shared.teardown_all();
    }

    async fn establish(
        &self,
        generation: u64,
        video: Arc<dyn VideoSource>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> SessionResult<()> {
        let audio = &self.config.audio;
        let output_rate = audio.output_sample_rate;

        let speaker = Arc::clone(&self.speaker);
        let output = open_device(move || speaker.open(output_rate)).await?;
        debug!(rate = output_rate, "Speaker opened");
        self.shared
            .stash(generation, |r| r.set_output(Arc::clone(&output)))
            .inspect_err(|_| output.close())?;

        let (raw_tx, raw_rx) = mpsc::channel(RAW_AUDIO_CAPACITY);
        let microphone = Arc::clone(&self.microphone);
        let mut capture = open_device(move || microphone.open(raw_tx)).await?;
        let pipeline = match InputPipeline::new(
            capture.sample_rate(),
            capture.channels(),
            audio.input_sample_rate,
            audio.input_block_size,
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                capture.stop();
                return Err(MediaAccessError::StreamFailed(e.to_string()).into());
            }
        };
        debug!(
            rate = capture.sample_rate(),
            channels = capture.channels(),
            "Microphone opened"
        );
        let mut capture = Some(capture);
        self.shared
            .stash(generation, |r| {
                if let Some(capture) = capture.take() {
                    r.set_capture(capture);
                }
            })
            .inspect_err(|_| {
                if let Some(mut capture) = capture.take() {
                    capture.stop();
                }
            })?;

        let LiveSession {
            outbound,
            mut inbound,
            guard,
        } = tokio::select! {
            session = self.transport.open(self.config.setup_message()) => session?,
            _ = &mut *cancel => return Err(SessionError::Cancelled),
        };
        self.shared
            .stash(generation, |r| r.set_link(outbound, guard))?;

        tokio::select! {
            result = wait_for_setup(&mut inbound) => result?,
            _ = &mut *cancel => return Err(SessionError::Cancelled),
        }
        debug!(generation, "Setup acknowledged");

        let shared = Arc::clone(&self.shared);
        let sampler = FrameSampler::new(video, self.config.sampler_settings());

        self.shared.go_live(generation, move |r| {
            let capture_task = tokio::spawn({
                let shared = Arc::clone(&shared);
                async move {
                    pipeline
                        .run(raw_rx, |block| forward_block(&shared, generation, block))
                        .await;
                }
            });

            let sampler_task = sampler.spawn({
                let shared = Arc::clone(&shared);
                move |frame| {
                    shared.send(generation, ClientMessage::media(frame.to_blob()));
                }
            });

            let inbound_task = tokio::spawn(run_inbound(shared, generation, inbound, output, output_rate));

            r.push_task(capture_task);
            r.push_task(sampler_task);
            r.push_task(inbound_task);
        })
    }

    /// 静默释放资源后以 Error 结束该代
    fn fail(&self, generation: u64, err: SessionError) -> SessionError {
        error!(generation, "Connect failed: {}", err);
        self.shared.teardown(generation);

        match self.shared.sink.end(generation, ConnectionState::Error) {
            Ok(()) => err,
            Err(_) => SessionError::Cancelled,
        }
    }
}

impl<T: Transport, M: Microphone, S: Speaker> Drop for StreamingSession<T, M, S> {
    fn drop(&mut self) {
        self.shared.sink.invalidate();
        self.shared.teardown_all();
    }
}

/// 在阻塞线程池中打开音频设备
///
/// 设备初始化可能耗时数百毫秒，不能占用异步工作线程
async fn open_device<R, F>(open: F) -> Result<R, MediaAccessError>
where
    F: FnOnce() -> Result<R, MediaAccessError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(open)
        .await
        .map_err(|e| MediaAccessError::StreamFailed(e.to_string()))?
}

/// 等待远端确认 setup
async fn wait_for_setup(inbound: &mut mpsc::Receiver<TransportEvent>) -> Result<(), NetworkError> {
    loop {
        match inbound.recv().await {
            Some(TransportEvent::Message(message)) if message.is_setup_complete() => return Ok(()),
            Some(TransportEvent::Message(_)) => debug!("Ignoring message received before setup completed"),
            Some(TransportEvent::Failed(reason)) => return Err(NetworkError::ConnectionFailed(reason)),
            Some(TransportEvent::Closed) | None => return Err(NetworkError::ConnectionClosed),
        }
    }
}
