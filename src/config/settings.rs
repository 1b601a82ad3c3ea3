//! 应用配置加载和管理

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use validator::Validate;

/// 应用配置结构
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub streams: StreamSettings,
    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// 后端 API 配置
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// REST / SSE 基础地址（包含 /api 前缀）
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String { "http://192.168.137.1:5000/api".to_string() }

/// 会话持久化配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// 会话文件路径
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf { PathBuf::from(".iotboard/session.json") }

/// 断线重连策略
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectMode {
    /// 出错即关闭，等待用户重新触发
    #[default]
    Manual,
    /// 指数退避自动重连
    Backoff,
}

/// 实时数据流配置
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSettings {
    #[serde(default)]
    pub reconnect: ReconnectMode,
    /// 退避基础延迟（毫秒）
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// 退避最大延迟（毫秒）
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// 最大重连次数（0 = 不限）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect: ReconnectMode::Manual,
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay() -> u64 { 1000 }
fn default_max_delay() -> u64 { 60_000 }
fn default_max_attempts() -> u32 { 10 }

/// 预警回溯上限（小时）
pub const MAX_ALERT_LOOKBACK_HOURS: i64 = 720;
/// 事件回溯上限（天）
pub const MAX_EVENT_LOOKBACK_DAYS: i64 = 365;

/// 仪表盘行为配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DashboardSettings {
    /// 预警、事件、历史缓冲区容量
    #[serde(default = "default_buffer_capacity")]
    #[validate(range(min = 1, message = "buffer_capacity 必须大于 0"))]
    pub buffer_capacity: usize,
    /// 图表展示点数
    #[serde(default = "default_chart_points")]
    #[validate(range(min = 1, message = "chart_points 必须大于 0"))]
    pub chart_points: usize,
    /// 预警筛选最早可回溯小时数
    #[serde(default = "default_alert_lookback")]
    #[validate(range(min = 1, max = 720, message = "alert_lookback_hours 必须在 1-720 之间"))]
    pub alert_lookback_hours: i64,
    /// 事件筛选最早可回溯天数
    #[serde(default = "default_event_lookback")]
    #[validate(range(min = 1, max = 365, message = "event_lookback_days 必须在 1-365 之间"))]
    pub event_lookback_days: i64,
    /// 事件默认时间窗（天）
    #[serde(default = "default_event_window")]
    #[validate(range(min = 1, max = 365, message = "event_default_days 必须在 1-365 之间"))]
    pub event_default_days: i64,
    /// 显示时区（IANA 名称）
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            chart_points: default_chart_points(),
            alert_lookback_hours: default_alert_lookback(),
            event_lookback_days: default_event_lookback(),
            event_default_days: default_event_window(),
            timezone: default_timezone(),
        }
    }
}

impl DashboardSettings {
    /// 校验取值范围，默认事件窗口不能超过可回溯天数
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Message(format!("dashboard 配置无效: {}", e)))?;
        if self.event_default_days > self.event_lookback_days {
            return Err(ConfigError::Message(
                "dashboard 配置无效: event_default_days 不能大于 event_lookback_days".to_string(),
            ));
        }
        Ok(())
    }

    /// 解析显示时区，无效时回退到 UTC
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "无效的时区配置，使用 UTC");
            Tz::UTC
        })
    }
}

fn default_buffer_capacity() -> usize { 100 }
fn default_chart_points() -> usize { 24 }
fn default_alert_lookback() -> i64 { 8 }
fn default_event_lookback() -> i64 { 31 }
fn default_event_window() -> i64 { 7 }
fn default_timezone() -> String { "Asia/Bangkok".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// text | json
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Settings {
    /// 从配置文件和环境变量加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        let mut settings: Settings = Config::builder()
            // 加载默认配置
            .add_source(File::with_name("config/default").required(false))
            // 根据环境加载对应配置
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // 环境变量覆盖，前缀 IOTBOARD，分隔符 __
            .add_source(
                Environment::with_prefix("IOTBOARD")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        // 兼容单独设置的基础地址
        if let Ok(base_url) = env::var("IOTBOARD_API_BASE_URL") {
            settings.api.base_url = base_url;
        }

        settings.dashboard.check()?;

        Ok(settings)
    }

    /// 获取登录用户名（从环境变量）
    pub fn username() -> Option<String> {
        env::var("IOTBOARD_USERNAME").ok().filter(|s| !s.is_empty())
    }

    /// 获取登录密码（从环境变量）
    pub fn password() -> Option<SecretString> {
        env::var("IOTBOARD_PASSWORD").ok().map(SecretString::new)
    }
}
