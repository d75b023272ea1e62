use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{
    decode, encode, rms, strided_rms, AudioFrame, AudioOutput, CaptureHandle, PlaybackScheduler,
    OUTPUT_METER_POINTS,
};
use crate::network::{ClientMessage, ServerMessage, TaskGuard, TransportEvent};
use crate::state::{ConnectionState, EventSink};

use super::error::{SessionError, SessionResult};

/// 单次连接持有的全部资源
///
/// 丢弃时 `cancel` 随之丢弃，正在等待的 `connect()` 会因此收到取消信号
pub(super) struct Resources {
    generation: u64,
    output: Option<Arc<dyn AudioOutput>>,
    capture: Option<Box<dyn CaptureHandle>>,
    outbound: Option<mpsc::Sender<ClientMessage>>,
    guard: Option<TaskGuard>,
    tasks: Vec<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Resources {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            output: None,
            capture: None,
            outbound: None,
            guard: None,
            tasks: Vec::new(),
            cancel: None,
        }
    }

    pub(super) fn set_cancel(&mut self, cancel: oneshot::Sender<()>) {
        self.cancel = Some(cancel);
    }

    pub(super) fn set_output(&mut self, output: Arc<dyn AudioOutput>) {
        self.output = Some(output);
    }

    pub(super) fn set_capture(&mut self, capture: Box<dyn CaptureHandle>) {
        self.capture = Some(capture);
    }

    pub(super) fn set_link(&mut self, outbound: mpsc::Sender<ClientMessage>, guard: TaskGuard) {
        self.outbound = Some(outbound);
        self.guard = Some(guard);
    }

    pub(super) fn push_task(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// 按获取的逆序释放
    fn release(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        drop(self.guard.take());
        drop(self.outbound.take());

        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(output) = self.output.take() {
            output.close();
        }

        debug!(generation = self.generation, "Session resources released");
    }
}

/// 会话与其后台任务共享的状态
pub(super) struct Shared {
    pub(super) sink: EventSink,
    pub(super) scheduler: PlaybackScheduler,
    resources: Mutex<Option<Resources>>,
}

impl Shared {
    pub(super) fn new(sink: EventSink) -> Self {
        Self {
            sink,
            scheduler: PlaybackScheduler::new(),
            resources: Mutex::new(None),
        }
    }

    /// 在 `generation` 仍为当前代时修改其资源
    ///
    /// 检查与修改在同一把锁内完成，因此与 `disconnect()` 的先后关系是确定的：
    /// 要么资源被登记后由 `disconnect()` 释放，要么这里返回 `Cancelled`。
    pub(super) fn stash<F>(&self, generation: u64, update: F) -> SessionResult<()>
    where
        F: FnOnce(&mut Resources),
    {
        let mut slot = self.lock();

        if self.sink.generation() != generation {
            debug!(generation, "Connect attempt superseded");
            return Err(SessionError::Cancelled);
        }

        if slot.as_ref().is_some_and(|r| r.generation != generation) {
            if let Some(stale) = slot.take() {
                warn!(generation = stale.generation, "Releasing resources of a stale session");
                stale.release();
            }
        }

        update(slot.get_or_insert_with(|| Resources::new(generation)));
        Ok(())
    }

    /// 与 `stash` 相同，但在锁内先推进到 Connected
    pub(super) fn go_live<F>(&self, generation: u64, start: F) -> SessionResult<()>
    where
        F: FnOnce(&mut Resources),
    {
        let mut slot = self.lock();

        if self
            .sink
            .transition(generation, ConnectionState::Connected)
            .is_err()
        {
            return Err(SessionError::Cancelled);
        }

        start(slot.get_or_insert_with(|| Resources::new(generation)));
        Ok(())
    }

    /// 释放 `generation` 的资源；其他代的资源保持不变
    pub(super) fn teardown(&self, generation: u64) -> bool {
        let resources = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some(r) if r.generation == generation => slot.take(),
                _ => None,
            }
        };

        match resources {
            Some(resources) => {
                resources.release();
                self.scheduler.reset();
                true
            }
            None => false,
        }
    }

    /// 释放当前持有的任何资源
    pub(super) fn teardown_all(&self) {
        let resources = self.lock().take();
        if let Some(resources) = resources {
            resources.release();
        }
        self.scheduler.reset();
    }

    /// 以 `generation` 的名义发送上行消息
    ///
    /// 上行发送端只保存在资源中，释放后该代的所有生产者都无法再发送。
    /// 返回 `false` 表示该代已结束或队列已关闭。
    pub(super) fn send(&self, generation: u64, message: ClientMessage) -> bool {
        let slot = self.lock();
        match slot.as_ref() {
            Some(r) if r.generation == generation => match r.outbound.as_ref() {
                Some(outbound) => forward(outbound, message),
                None => false,
            },
            _ => {
                debug!(generation, kind = message.kind(), "Dropping message of an ended session");
                false
            }
        }
    }

    /// 运行期故障：释放资源后以 `to` 结束该代
    fn finish(&self, generation: u64, to: ConnectionState) {
        self.teardown(generation);
        if let Err(e) = self.sink.end(generation, to) {
            debug!("Session already ended: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Resources>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 将一个麦克风音频块发送到上行队列
///
/// 返回 `false` 表示该代已结束，采集循环应停止
pub(super) fn forward_block(shared: &Shared, generation: u64, block: AudioFrame) -> bool {
    if !shared.sink.volume(generation, rms(block.samples()), false) {
        return false;
    }

    shared.send(generation, ClientMessage::media(encode(&block)))
}

/// 非阻塞发送；队列已满时丢弃最新消息
fn forward(outbound: &mpsc::Sender<ClientMessage>, message: ClientMessage) -> bool {
    match outbound.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            debug!(kind = message.kind(), "Outbound queue full, dropping message");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Outbound queue closed");
            false
        }
    }
}

/// 下行消息循环
///
/// 解码音频并交给播放调度器，直到会话关闭或失败
pub(super) async fn run_inbound(
    shared: Arc<Shared>,
    generation: u64,
    mut inbound: mpsc::Receiver<TransportEvent>,
    output: Arc<dyn AudioOutput>,
    output_rate: u32,
) {
    info!(generation, "Inbound loop started");

    while let Some(event) = inbound.recv().await {
        match event {
            TransportEvent::Message(message) => {
                if !handle_message(&shared, generation, &message, output.as_ref(), output_rate) {
                    debug!(generation, "Inbound loop superseded");
                    return;
                }
            }
            TransportEvent::Closed => {
                info!(generation, "Remote endpoint closed the session");
                shared.finish(generation, ConnectionState::Disconnected);
                return;
            }
            TransportEvent::Failed(reason) => {
                error!(generation, "Live session failed: {}", reason);
                shared.finish(generation, ConnectionState::Error);
                return;
            }
        }
    }

    info!(generation, "Inbound channel ended");
    shared.finish(generation, ConnectionState::Disconnected);
}

fn handle_message(
    shared: &Shared,
    generation: u64,
    message: &ServerMessage,
    output: &dyn AudioOutput,
    output_rate: u32,
) -> bool {
    for payload in message.audio_payloads() {
        let buffer = match decode(payload, output_rate) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Dropping malformed audio chunk: {}", e);
                continue;
            }
        };

        let level = strided_rms(buffer.samples(), OUTPUT_METER_POINTS);
        if !shared.sink.volume(generation, level, true) {
            return false;
        }
        shared.scheduler.schedule(output, buffer);
    }

    if message.is_interrupted() {
        info!("Model turn interrupted");
    }
    if message.is_turn_complete() {
        debug!("Model turn complete");
    }
    if let Some(go_away) = &message.go_away {
        warn!(time_left = ?go_away.time_left, "Endpoint announced it will close the session");
    }

    true
}
