//! 仪表盘模块
//!
//! - `state`: 纯状态机（选择、快照、推送缓冲、筛选）
//! - `controller`: 异步控制器，驱动服务和数据流通道

mod buffer;
mod chart;
mod controller;
mod filters;
mod state;

pub use buffer::{distinct_sensor_types, CappedBuffer, LatestReadings, RollingBuffer};
pub use chart::{derive_chart_series, ChartPoint};
pub use controller::Dashboard;
pub use filters::{AlertFilter, DeviceScope, EventFilter, FilterLimits};
pub use state::{DashboardState, FetchTicket, SelectionTicket};

// 展示格式化
pub use crate::utils::{format_local_datetime, format_sensor_value, format_time_of_day};
