//! 实时数据流模块
//!
//! 通过 SSE 长连接接收三类推送：
//! - 预警（整个会话一条连接）
//! - 设备事件（整个会话一条连接）
//! - 当前选中设备的传感器读数（切换设备时替换）

mod messages;
mod sse;
mod supervisor;

pub use messages::*;
pub use sse::{SseDecoder, SseEvent};
pub use supervisor::{ReconnectPolicy, StreamSupervisor};
