//! 设备事件模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::flexible_datetime;

/// 设备事件（上线、离线、故障等）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    pub device_id: String,
    #[serde(with = "flexible_datetime")]
    pub event_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub event_type: String,
}
