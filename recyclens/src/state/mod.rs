//! 状态管理模块
//!
//! 提供连接状态机和状态/音量事件出口
//!
//! # 模块结构
//!
//! - `connection_state` - 连接状态定义和转换规则
//! - `error` - 状态相关错误类型
//! - `sink` - 带代数校验的回调出口

mod connection_state;
mod error;
mod sink;

pub use connection_state::ConnectionState;
pub use error::{StateError, StateResult};
pub use sink::{EventSink, StateCallback, VolumeCallback};
