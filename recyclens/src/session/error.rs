use thiserror::Error;

use crate::config::ConfigError;
use crate::media::MediaAccessError;
use crate::network::NetworkError;

/// 会话错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 麦克风或扬声器无法获取
    #[error("Media access error: {0}")]
    MediaAccess(#[from] MediaAccessError),

    /// 网络会话建立或运行失败
    #[error("Transport error: {0}")]
    Transport(#[from] NetworkError),

    /// 配置无效
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 会话已在连接或已连接
    #[error("Session is already active")]
    AlreadyActive,

    /// 连接过程被 `disconnect()` 中止
    #[error("Connect was cancelled by disconnect")]
    Cancelled,
}

/// 会话结果类型
pub type SessionResult<T> = Result<T, SessionError>;
