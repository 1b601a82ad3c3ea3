//! iotboard - IoT 设备监控仪表盘客户端
//!
//! 无界面运行：恢复或建立会话，订阅实时推送并写入日志

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iotboard::{
    config::{LoggingSettings, Settings},
    dashboard::{format_local_datetime, format_sensor_value, Dashboard},
    errors::{failure_message, Action},
    security::AuthState,
    stream::{StreamPayload, StreamUpdate},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let settings = Settings::load().context("配置加载失败")?;

    // 初始化日志
    init_tracing(&settings.logging);

    info!("🌱 iotboard 启动中...");
    info!(base_url = %settings.api.base_url, "✅ 配置加载完成");

    let dashboard = Dashboard::from_settings(&settings).context("客户端初始化失败")?;

    // 恢复或建立会话
    if dashboard.restore().await? {
        info!("✅ 已恢复本地会话");
    } else {
        let username = Settings::username().context("未设置 IOTBOARD_USERNAME")?;
        let password = Settings::password().context("未设置 IOTBOARD_PASSWORD")?;

        match dashboard.login(&username, &password).await {
            Ok(user) => info!(username = %user.username, role = %user.role, "✅ 登录成功"),
            Err(e) => {
                error!(reason = %failure_message(Action::Login, &e), "❌ 登录失败");
                return Err(e.into());
            }
        }
    }

    let tz = settings.dashboard.tz();
    dashboard.with_state(|state| {
        info!(
            devices = state.devices().len(),
            selected = ?state.selected_device(),
            sensor_type = ?state.selected_sensor_type(),
            alerts = state.alert_count(),
            events = state.events().len(),
            editor = state.is_editor(),
            "📊 仪表盘就绪"
        );
    });

    let mut auth_rx = dashboard.session().subscribe();

    loop {
        tokio::select! {
            update = dashboard.next_update() => match update {
                Some(update) => log_update(&update, tz),
                None => break,
            },
            changed = auth_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if *auth_rx.borrow() == AuthState::SignedOut {
                    warn!("⚠️ 会话已失效，请重新登录");
                    dashboard.handle_signed_out();
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 收到退出信号");
                break;
            }
        }
    }

    dashboard.close();
    info!("👋 iotboard 已退出");
    Ok(())
}

fn log_update(update: &StreamUpdate, tz: chrono_tz::Tz) {
    match &update.payload {
        StreamPayload::Alert(alert) => warn!(
            device_id = %alert.device_id,
            sensor_type = %alert.sensor_type,
            severity = %alert.severity,
            value = %format_sensor_value(alert.value),
            time = %format_local_datetime(&alert.timestamp, tz),
            "🚨 {}",
            alert.message
        ),
        StreamPayload::Event(event) => info!(
            device_id = %event.device_id,
            event_type = %event.event_type,
            time = %format_local_datetime(&event.event_time, tz),
            "📟 {}",
            event.description
        ),
        StreamPayload::Reading(reading) => debug!(
            device_id = %reading.device_id,
            sensor_type = %reading.sensor_type,
            value = %format_sensor_value(reading.value),
            "📈 新读数"
        ),
        StreamPayload::Closed { reason } => warn!(
            channel = %update.kind,
            reason = %reason,
            "🔌 数据流通道已关闭"
        ),
    }
}

fn init_tracing(logging: &LoggingSettings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{},iotboard=debug", logging.level))
    });
    let json = logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(env_filter)
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(true)))
        .init();
}
