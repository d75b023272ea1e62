use thiserror::Error;

use super::connection_state::ConnectionState;

/// 状态相关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// 事件来自已结束的会话代
    #[error("Stale generation {generation} (current {current})")]
    StaleGeneration { generation: u64, current: u64 },
}

/// 状态模块的结果类型
pub type StateResult<T> = Result<T, StateError>;
