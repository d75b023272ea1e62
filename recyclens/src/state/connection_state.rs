use std::fmt;

use serde::Serialize;

/// 连接状态
///
/// 流式会话对外暴露的唯一状态，只能由会话自身的生命周期推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ConnectionState {
    /// 未连接（初始状态，也是 `disconnect()` 之后的状态）
    #[default]
    Disconnected,

    /// 正在获取设备并建立会话
    Connecting,

    /// 会话已建立，音视频正在流动
    Connected,

    /// 连接失败或运行时出错，直到下一次 `connect()`
    Error,
}

impl ConnectionState {
    /// 检查是否处于活动状态（Connecting 或 Connected）
    ///
    /// # Examples
    ///
    /// ```
    /// use recyclens_lib::state::ConnectionState;
    ///
    /// assert!(ConnectionState::Connecting.is_active());
    /// assert!(!ConnectionState::Error.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// 获取状态名称（用于日志和调试）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Error => "Error",
        }
    }

    /// 验证状态转换是否合法
    ///
    /// 任何状态都可以回到 Disconnected；Connecting 只能从非活动状态进入
    pub fn can_transition_to(&self, to: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, to) {
            (_, Disconnected) => true,
            (Disconnected | Error, Connecting) => true,
            (Connecting, Connected) => true,
            (Connecting | Connected, Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
