//! iotboard - IoT 设备监控仪表盘客户端
//!
//! 仪表盘的状态同步层，支持：
//! - 会话保管与令牌自动刷新
//! - 设备、阈值、预测配置管理
//! - 预警、设备事件、传感器读数的 SSE 实时推送
//! - 有界缓冲、筛选校验与图表序列

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod models;
pub mod security;
pub mod services;
pub mod stream;
pub mod utils;

pub use dashboard::Dashboard;
pub use errors::ClientError;
