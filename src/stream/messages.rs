//! 推送消息类型定义

use std::fmt;

use crate::errors::ClientError;
use crate::models::{Alert, DeviceEvent, SensorReading};

/// 通道种类（每种最多一条连接）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Alerts,
    DeviceEvents,
    Sensor,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Alerts => "alerts",
            ChannelKind::DeviceEvents => "device-events",
            ChannelKind::Sensor => "sensor",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 要打开的通道
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Alerts,
    DeviceEvents,
    /// 单个设备的传感器读数
    Sensor(String),
}

impl Channel {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Alerts => ChannelKind::Alerts,
            Channel::DeviceEvents => ChannelKind::DeviceEvents,
            Channel::Sensor(_) => ChannelKind::Sensor,
        }
    }

    /// SSE 端点路径段
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            Channel::Alerts => vec!["alerts", "sse"],
            Channel::DeviceEvents => vec!["device-events", "sse"],
            Channel::Sensor(device_id) => vec!["sensor-data", device_id.as_str(), "sse"],
        }
    }
}

/// 推送内容
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    Alert(Alert),
    Event(DeviceEvent),
    Reading(SensorReading),
    /// 通道已关闭（出错或服务端结束）
    Closed { reason: String },
}

/// 带通道代次的推送
///
/// `generation` 在每次打开通道时递增，旧连接的残留消息据此丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct StreamUpdate {
    pub kind: ChannelKind,
    pub generation: u64,
    pub payload: StreamPayload,
}

/// 按通道种类解析消息 JSON
pub fn decode_payload(kind: ChannelKind, data: &str) -> Result<StreamPayload, ClientError> {
    let payload = match kind {
        ChannelKind::Alerts => StreamPayload::Alert(serde_json::from_str(data)?),
        ChannelKind::DeviceEvents => StreamPayload::Event(serde_json::from_str(data)?),
        ChannelKind::Sensor => StreamPayload::Reading(serde_json::from_str(data)?),
    };
    Ok(payload)
}
