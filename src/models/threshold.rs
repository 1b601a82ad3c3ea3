//! 传感器阈值与预测配置模型
//!
//! 两者都是以 sensor_type 为主键的小型参考表，每次获取整体替换。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ClientError;
use crate::utils::{lenient_f64, validate_hours_window, validate_required, validate_threshold_range};

/// 传感器阈值（min_value < max_value）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    #[validate(length(min = 1, max = 50, message = "请输入传感器类型"))]
    pub sensor_type: String,
    #[serde(with = "lenient_f64")]
    pub min_value: f64,
    #[serde(with = "lenient_f64")]
    pub max_value: f64,
}

impl Threshold {
    pub fn new(sensor_type: impl Into<String>, min_value: f64, max_value: f64) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            min_value,
            max_value,
        }
    }

    /// 提交前校验
    pub fn check(&self) -> Result<(), ClientError> {
        validate_required(&self.sensor_type, "传感器类型")?;
        self.validate()?;
        validate_threshold_range(self.min_value, self.max_value)
    }

    /// 更新表单字段（multipart）
    pub fn update_form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("minValue".to_string(), self.min_value.to_string()),
            ("maxValue".to_string(), self.max_value.to_string()),
        ]
    }
}

/// 预测配置（hours_window > 0）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForecastConfig {
    #[validate(length(min = 1, max = 50, message = "请输入传感器类型"))]
    pub sensor_type: String,
    pub hours_window: i64,
}

impl ForecastConfig {
    pub fn new(sensor_type: impl Into<String>, hours_window: i64) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            hours_window,
        }
    }

    /// 提交前校验
    pub fn check(&self) -> Result<(), ClientError> {
        validate_required(&self.sensor_type, "传感器类型")?;
        self.validate()?;
        validate_hours_window(self.hours_window)
    }

    /// 创建表单字段（multipart）
    pub fn create_form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("sensorType".to_string(), self.sensor_type.trim().to_string()),
            ("hoursWindow".to_string(), self.hours_window.to_string()),
        ]
    }

    /// 更新表单字段（multipart）
    pub fn update_form_fields(&self) -> Vec<(String, String)> {
        vec![("hoursWindow".to_string(), self.hours_window.to_string())]
    }
}
