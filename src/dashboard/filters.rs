//! 预警与事件筛选条件
//!
//! 校验在发请求之前进行，失败时返回 [`ClientError::Validation`]，不会发出任何请求。

use chrono::{DateTime, Duration, Utc};

use crate::config::{DashboardSettings, MAX_ALERT_LOOKBACK_HOURS, MAX_EVENT_LOOKBACK_DAYS};
use crate::errors::ClientError;
use crate::models::TimeWindow;

/// 时间窗回溯限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterLimits {
    pub alert_lookback: Duration,
    pub event_lookback: Duration,
    pub event_default: Duration,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            alert_lookback: Duration::hours(8),
            event_lookback: Duration::days(31),
            event_default: Duration::days(7),
        }
    }
}

impl FilterLimits {
    /// 未经 [`DashboardSettings::check`] 的取值也会被夹到合法范围内
    pub fn from_settings(settings: &DashboardSettings) -> Self {
        let event_lookback = settings.event_lookback_days.clamp(1, MAX_EVENT_LOOKBACK_DAYS);
        Self {
            alert_lookback: Duration::hours(settings.alert_lookback_hours.clamp(1, MAX_ALERT_LOOKBACK_HOURS)),
            event_lookback: Duration::days(event_lookback),
            event_default: Duration::days(settings.event_default_days.clamp(1, event_lookback)),
        }
    }
}

/// 预警筛选
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFilter {
    pub device_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AlertFilter {
    pub fn new(device_id: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            start: Some(start),
            end: Some(end),
        }
    }

    /// 默认筛选：指定设备的最近 lookback 时间
    pub fn trailing(device_id: impl Into<String>, now: DateTime<Utc>, lookback: Duration) -> Self {
        Self::new(device_id, now - lookback, now)
    }

    pub fn validate(&self, now: DateTime<Utc>, lookback: Duration) -> Result<TimeWindow, ClientError> {
        if self.device_id.trim().is_empty() {
            return Err(ClientError::Validation("请选择设备".to_string()));
        }
        validate_window(self.start, self.end, now, lookback, &describe_lookback(lookback))
    }
}

/// 事件筛选的设备范围
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceScope {
    #[default]
    All,
    One(String),
}

impl DeviceScope {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            DeviceScope::All => None,
            DeviceScope::One(id) => Some(id.as_str()),
        }
    }
}

/// 设备事件筛选
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub device: DeviceScope,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn new(device: DeviceScope, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            device,
            start: Some(start),
            end: Some(end),
        }
    }

    /// 未显式筛选时的默认窗口：全部设备、最近 window 时间
    pub fn trailing(now: DateTime<Utc>, window: Duration) -> Self {
        Self::new(DeviceScope::All, now - window, now)
    }

    pub fn validate(&self, now: DateTime<Utc>, lookback: Duration) -> Result<TimeWindow, ClientError> {
        validate_window(self.start, self.end, now, lookback, &describe_lookback(lookback))
    }
}

fn validate_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: Duration,
    lookback_label: &str,
) -> Result<TimeWindow, ClientError> {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ClientError::Validation("请选择开始和结束时间".to_string())),
    };

    if start < now - lookback {
        return Err(ClientError::Validation(format!(
            "开始时间不能早于{}前",
            lookback_label
        )));
    }
    if end > now {
        return Err(ClientError::Validation("结束时间不能晚于当前时间".to_string()));
    }
    if start >= end {
        return Err(ClientError::Validation("开始时间必须早于结束时间".to_string()));
    }

    Ok(TimeWindow::new(start, end))
}

fn describe_lookback(lookback: Duration) -> String {
    if lookback.num_hours() % 24 == 0 && lookback.num_days() > 0 {
        format!(" {} 天", lookback.num_days())
    } else {
        format!(" {} 小时", lookback.num_hours())
    }
}
