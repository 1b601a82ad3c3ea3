//! 传感器读数与分析数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{flexible_datetime, lenient_f64};

/// 传感器读数
///
/// "最新读数" 的身份为 (device_id, sensor_type)。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub device_id: String,
    pub sensor_type: String,
    #[serde(with = "lenient_f64")]
    pub value: f64,
    #[serde(with = "flexible_datetime")]
    pub timestamp: DateTime<Utc>,
}

/// 每日分析结果（后端计算，按设备 + 日期获取）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub device_id: String,
    pub analysis_date: String,
    pub sensor_type: String,
    #[serde(with = "lenient_f64")]
    pub avg_value: f64,
    #[serde(with = "lenient_f64")]
    pub max_value: f64,
    #[serde(with = "lenient_f64")]
    pub min_value: f64,
    #[serde(default)]
    pub data_points: u64,
    #[serde(default, with = "lenient_f64::option")]
    pub predicted_value: Option<f64>,
    #[serde(with = "flexible_datetime")]
    pub processed_at: DateTime<Utc>,
}
