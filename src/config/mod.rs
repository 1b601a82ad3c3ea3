//! 配置管理模块

mod settings;

pub use settings::{
	ApiSettings,
	DashboardSettings,
	LoggingSettings,
	MAX_ALERT_LOOKBACK_HOURS,
	MAX_EVENT_LOOKBACK_DAYS,
	ReconnectMode,
	SessionSettings,
	Settings,
	StreamSettings,
};
