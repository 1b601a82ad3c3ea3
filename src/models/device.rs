//! 设备数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::errors::ClientError;
use crate::utils::{flexible_datetime, validate_required};

/// 已知的设备类型
pub const DEVICE_TYPES: [&str; 3] = ["TemperatureSensor", "HumiditySensor", "PressureSensor"];

/// 设备状态枚举
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceStatus {
    #[default]
    Active,
    Inactive,
    Offline,
    Faulty,
    Maintenance,
    Decommissioned,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 6] = [
        DeviceStatus::Active,
        DeviceStatus::Inactive,
        DeviceStatus::Offline,
        DeviceStatus::Faulty,
        DeviceStatus::Maintenance,
        DeviceStatus::Decommissioned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "Active",
            DeviceStatus::Inactive => "Inactive",
            DeviceStatus::Offline => "Offline",
            DeviceStatus::Faulty => "Faulty",
            DeviceStatus::Maintenance => "Maintenance",
            DeviceStatus::Decommissioned => "Decommissioned",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备实体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default, with = "flexible_datetime::option")]
    pub registered_at: Option<DateTime<Utc>>,
}

/// 注册设备请求
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    #[validate(length(min = 1, max = 100, message = "请填写设备 ID"))]
    pub device_id: String,

    #[validate(length(min = 1, max = 100, message = "请填写设备名称"))]
    pub name: String,

    #[validate(length(min = 1, max = 200, message = "请填写设备位置"))]
    pub location: String,

    #[serde(rename = "type")]
    pub device_type: String,

    pub status: DeviceStatus,
}

impl NewDevice {
    pub fn new(device_id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            location: location.into(),
            device_type: DEVICE_TYPES[0].to_string(),
            status: DeviceStatus::default(),
        }
    }

    /// 提交前校验
    pub fn check(&self) -> Result<(), ClientError> {
        validate_required(&self.device_id, "设备 ID")?;
        validate_required(&self.name, "设备名称")?;
        validate_required(&self.location, "设备位置")?;
        self.validate()?;
        Ok(())
    }

    /// 表单字段（multipart）
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("deviceId".to_string(), self.device_id.trim().to_string()),
            ("name".to_string(), self.name.trim().to_string()),
            ("location".to_string(), self.location.trim().to_string()),
            ("type".to_string(), self.device_type.clone()),
            ("status".to_string(), self.status.to_string()),
        ]
    }
}

/// 更新设备请求（空字段不提交）
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub device_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub status: Option<DeviceStatus>,
}

impl DeviceUpdate {
    /// 表单字段（multipart），只包含非空值
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        if let Some(name) = self.name.as_deref().filter(|s| !s.is_empty()) {
            fields.push(("name".to_string(), name.to_string()));
        }
        if let Some(location) = self.location.as_deref().filter(|s| !s.is_empty()) {
            fields.push(("location".to_string(), location.to_string()));
        }
        if let Some(status) = self.status {
            fields.push(("status".to_string(), status.to_string()));
        }
        fields
    }
}
