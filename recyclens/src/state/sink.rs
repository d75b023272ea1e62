use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use tracing::{debug, info};

use super::connection_state::ConnectionState;
use super::error::{StateError, StateResult};

/// 状态变更回调
pub type StateCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// 音量变更回调 `(level, is_output)`
pub type VolumeCallback = Arc<dyn Fn(f32, bool) + Send + Sync>;

/// 代数与最近一次发出的状态，两者在同一把锁下更新
#[derive(Debug, Default)]
struct Ledger {
    generation: u64,
    last_emitted: Option<ConnectionState>,
}

/// 状态与音量事件出口
///
/// 所有回调都在同一把锁内、且仅在调用方的代数仍为当前代时执行，
/// 因此 `disconnect()` 返回后旧生产者的回调不会再触发。
///
/// 回调在锁内运行，不得同步回调进入会话（例如在回调中直接调用
/// `disconnect()`），需要时请转交给其他任务。
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use recyclens_lib::state::{ConnectionState, EventSink};
///
/// let sink = EventSink::new(Arc::new(|state| println!("{state}")), Arc::new(|_, _| {}));
///
/// let generation = sink.begin().unwrap();
/// sink.transition(generation, ConnectionState::Connected).unwrap();
/// assert_eq!(sink.current(), ConnectionState::Connected);
///
/// sink.disconnect();
/// assert!(!sink.volume(generation, 0.5, true));
/// ```
pub struct EventSink {
    on_state: StateCallback,
    on_volume: VolumeCallback,
    /// 当前状态（使用 ArcSwap 实现无锁读取）
    current: ArcSwap<ConnectionState>,
    ledger: Mutex<Ledger>,
}

impl EventSink {
    /// 创建新的事件出口，初始状态为 Disconnected，不发出任何回调
    pub fn new(on_state: StateCallback, on_volume: VolumeCallback) -> Self {
        Self {
            on_state,
            on_volume,
            current: ArcSwap::from_pointee(ConnectionState::Disconnected),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// 获取当前状态
    ///
    /// 此方法是无锁的，可以在任何线程安全地调用
    pub fn current(&self) -> ConnectionState {
        **self.current.load()
    }

    /// 获取当前代数
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// 开始新一代会话并发出 Connecting
    ///
    /// # Errors
    ///
    /// 当前处于活动状态时返回 [`StateError::InvalidTransition`]，不发出回调
    pub fn begin(&self) -> StateResult<u64> {
        let mut ledger = self.lock();
        let from = self.current();

        if !from.can_transition_to(ConnectionState::Connecting) {
            return Err(StateError::InvalidTransition {
                from,
                to: ConnectionState::Connecting,
            });
        }

        ledger.generation += 1;
        self.emit(&mut ledger, ConnectionState::Connecting);
        Ok(ledger.generation)
    }

    /// 在同一代内推进状态
    ///
    /// # Errors
    ///
    /// 代数已过期或转换不合法时返回错误，不发出回调
    pub fn transition(&self, generation: u64, to: ConnectionState) -> StateResult<()> {
        let mut ledger = self.lock();
        self.check(&ledger, generation, to)?;
        self.emit(&mut ledger, to);
        Ok(())
    }

    /// 以终止状态结束指定代
    ///
    /// 发出 `to` 之后该代的所有事件都会被丢弃
    pub fn end(&self, generation: u64, to: ConnectionState) -> StateResult<()> {
        let mut ledger = self.lock();
        self.check(&ledger, generation, to)?;
        ledger.generation += 1;
        self.emit(&mut ledger, to);
        Ok(())
    }

    /// 结束当前代并回到 Disconnected
    ///
    /// 仅当上一次发出的状态不是 Disconnected 时才发出回调，
    /// 因此重复调用等价于调用一次。返回是否发出了回调。
    pub fn disconnect(&self) -> bool {
        let mut ledger = self.lock();
        ledger.generation += 1;

        if ledger.last_emitted == Some(ConnectionState::Disconnected) {
            debug!("Already disconnected, no state change emitted");
            return false;
        }

        self.emit(&mut ledger, ConnectionState::Disconnected);
        true
    }

    /// 静默结束当前代，不发出回调
    pub fn invalidate(&self) -> u64 {
        let mut ledger = self.lock();
        ledger.generation += 1;
        ledger.generation
    }

    /// 报告音量；代数过期时丢弃并返回 `false`
    pub fn volume(&self, generation: u64, level: f32, is_output: bool) -> bool {
        let ledger = self.lock();
        if ledger.generation != generation {
            return false;
        }

        (self.on_volume)(level, is_output);
        true
    }

    fn check(&self, ledger: &Ledger, generation: u64, to: ConnectionState) -> StateResult<()> {
        if ledger.generation != generation {
            return Err(StateError::StaleGeneration {
                generation,
                current: ledger.generation,
            });
        }

        let from = self.current();
        if !from.can_transition_to(to) {
            return Err(StateError::InvalidTransition { from, to });
        }

        Ok(())
    }

    fn emit(&self, ledger: &mut Ledger, state: ConnectionState) {
        info!(state = %state, generation = ledger.generation, "Connection state changed");

        self.current.store(Arc::new(state));
        ledger.last_emitted = Some(state);
        (self.on_state)(state);
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
