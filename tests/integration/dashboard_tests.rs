//! 仪表盘流程集成测试

use chrono::{Duration, Utc};
use reqwest::Method;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;

use iotboard::config::DashboardSettings;
use iotboard::dashboard::{AlertFilter, DeviceScope, EventFilter};
use iotboard::models::{ForecastConfig, Threshold, UserRole};
use iotboard::security::AuthState;
use iotboard::services::ApiClient;
use iotboard::stream::{Channel, ChannelKind, ReconnectPolicy, StreamPayload, StreamUpdate};
use iotboard::{ClientError, Dashboard};

use crate::helpers::*;
use crate::mocks::{Reply, ScriptedTransport};

fn dashboard(transport: &Arc<ScriptedTransport>) -> Dashboard {
    let api = ApiClient::new(BASE_URL, transport.clone(), signed_out_session()).unwrap();
    Dashboard::new(Arc::new(api), &DashboardSettings::default(), ReconnectPolicy::Manual)
}

fn history_json() -> Value {
    let mut data: Vec<Value> = (0..30)
        .map(|i| reading_json("d1", "Temperature", 20.0 + i as f64, i * 10))
        .collect();
    data.extend((0..5).map(|i| reading_json("d1", "Humidity", 50.0, i * 10 + 5)));
    json!({ "data": data })
}

/// 登记一套完整的后端应答
fn script_backend(transport: &ScriptedTransport, role: &str) {
    transport.on(Method::POST, "/auth/login", Reply::ok(tokens_json("login-access", "login-refresh")));
    transport.on(Method::GET, "/auth/profile", Reply::ok(user_json(role)));
    transport.on(Method::POST, "/auth/logout", Reply::Status(204));

    transport.on(Method::GET, "/alerts/sse", Reply::idle_stream());
    transport.on(Method::GET, "/device-events/sse", Reply::idle_stream());
    transport.on(Method::GET, "/sensor-data/d1/sse", Reply::idle_stream());
    transport.on(Method::GET, "/sensor-data/d2/sse", Reply::idle_stream());

    transport.on(Method::GET, "/devices", Reply::ok(json!([device_json("d1"), device_json("d2")])));
    transport.on(
        Method::GET,
        "/sensor-data/d1/latest",
        Reply::ok(json!([
            reading_json("d1", "Temperature", 48.7, 290),
            reading_json("d1", "Humidity", 50.0, 45),
        ])),
    );
    transport.on(Method::GET, "/sensor-data/d1", Reply::ok(history_json()));
    transport.on(Method::GET, "/analytics/d1", Reply::ok(json!([])));
    transport.on(Method::GET, "/sensor-data/d2/latest", Reply::ok(json!([])));
    transport.on(Method::GET, "/alerts/d1", Reply::ok(json!([alert_json("d1", "温度过高")])));
    transport.on(Method::GET, "/device-events", Reply::ok(json!([event_json("d1", "Online")])));
    transport.on(
        Method::GET,
        "/sensor-thresholds",
        Reply::ok(json!([{ "sensorType": "Temperature", "minValue": 10, "maxValue": 40 }])),
    );
    transport.on(Method::GET, "/sensor-forecast-configs", Reply::ok(json!([])));
}

async fn login(dashboard: &Dashboard) {
    let password = SecretString::new("secret".to_string());
    assert_ok!(dashboard.login("operator", &password).await);
}

async fn next_update(dashboard: &Dashboard) -> StreamUpdate {
    tokio::time::timeout(std::time::Duration::from_secs(2), dashboard.next_update())
        .await
        .expect("等待推送超时")
        .expect("推送通道已关闭")
}

mod bootstrap {
    use super::*;

    #[tokio::test]
    async fn test_login_loads_everything() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Admin");
        let dashboard = dashboard(&transport);

        login(&dashboard).await;

        let state = dashboard.snapshot();
        assert_eq!(state.user().map(|u| u.role), Some(UserRole::Admin));
        assert_eq!(state.devices().len(), 2);
        assert_eq!(state.selected_device(), Some("d1"), "应自动选择第一个设备");
        assert_eq!(state.selected_sensor_type(), Some("Temperature"));
        assert_eq!(
            state.sensor_types().to_vec(),
            vec!["Temperature".to_string(), "Humidity".to_string()]
        );

        assert_eq!(state.history().len(), 30, "历史只保留当前传感器类型");
        assert_eq!(state.chart_series().len(), 24);
        assert_eq!(state.current_latest().map(|r| r.value), Some(48.7));
        assert!(state.current_threshold().is_some());

        assert_eq!(state.alerts().len(), 1);
        assert_eq!(state.alert_filter().map(|f| f.device_id.as_str()), Some("d1"));
        assert_eq!(state.events().len(), 1);

        let profile = transport.last(&Method::GET, "/auth/profile").unwrap();
        assert_eq!(profile.bearer.as_deref(), Some("login-access"));

        let analytics = transport.last(&Method::GET, "/analytics/d1").unwrap();
        assert!(analytics.query_value("date").is_some());

        let alerts = transport.last(&Method::GET, "/alerts/d1").unwrap();
        assert!(alerts.query_value("start").is_some());
        assert!(alerts.query_value("end").is_some());

        assert!(dashboard.streams().is_open(ChannelKind::Alerts));
        assert!(dashboard.streams().is_open(ChannelKind::DeviceEvents));
        assert_eq!(
            dashboard.streams().current_channel(ChannelKind::Sensor),
            Some(Channel::Sensor("d1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_restore_with_rejected_profile() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/auth/profile", Reply::Json(500, json!({})));

        let session = signed_in_session();
        let api = ApiClient::new(BASE_URL, transport.clone(), session.clone()).unwrap();
        let dashboard =
            Dashboard::new(Arc::new(api), &DashboardSettings::default(), ReconnectPolicy::Manual);

        assert!(!assert_ok!(dashboard.restore().await));
        assert!(!session.is_authenticated());
        assert_eq!(transport.count(&Method::GET, "/devices"), 0);
    }

    #[tokio::test]
    async fn test_restore_without_session() {
        let transport = Arc::new(ScriptedTransport::new());
        let dashboard = dashboard(&transport);

        assert!(!assert_ok!(dashboard.restore().await));
        assert!(transport.requests().is_empty());
    }
}

mod selection {
    use super::*;

    #[tokio::test]
    async fn test_switching_device_resets_scope() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        assert_ok!(dashboard.select_device("d2").await);

        let state = dashboard.snapshot();
        assert_eq!(state.selected_device(), Some("d2"));
        assert_eq!(state.selected_sensor_type(), None);
        assert!(state.sensor_types().is_empty());
        assert!(state.history().is_empty(), "切换设备后历史应清空");
        assert!(state.latest().is_empty());
        assert_eq!(
            dashboard.streams().current_channel(ChannelKind::Sensor),
            Some(Channel::Sensor("d2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_switching_sensor_type_refetches() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        assert_ok!(dashboard.select_sensor_type(Some("Humidity")).await);

        let state = dashboard.snapshot();
        assert_eq!(state.selected_sensor_type(), Some("Humidity"));
        assert_eq!(state.history().len(), 5);
        assert!(state.history().iter().all(|r| r.sensor_type == "Humidity"));
        assert_eq!(transport.count(&Method::GET, "/sensor-data/d1"), 2);
    }

    #[tokio::test]
    async fn test_deleting_selected_device_moves_selection() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Editor");
        transport.on(Method::GET, "/devices", Reply::ok(json!([device_json("d2")])));
        transport.on(Method::DELETE, "/devices/d1", Reply::Status(204));
        transport.on(Method::GET, "/alerts/d2", Reply::ok(json!([alert_json("d2", "湿度过低")])));
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        assert_ok!(dashboard.delete_device("d1").await);

        let state = dashboard.snapshot();
        assert_eq!(state.devices().len(), 1);
        assert_eq!(state.selected_device(), Some("d2"));
        assert_eq!(
            state.alert_filter().map(|f| f.device_id.as_str()),
            Some("d2"),
            "设备列表变化后默认预警筛选跟随第一个设备"
        );
        assert_eq!(state.alerts().len(), 1);
        assert_eq!(transport.count(&Method::GET, "/alerts/d2"), 1);
        assert_eq!(transport.count(&Method::GET, "/device-events"), 2);
        assert_eq!(
            dashboard.streams().current_channel(ChannelKind::Sensor),
            Some(Channel::Sensor("d2".to_string()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_switching_devices_while_channel_opens() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Viewer");
        let dashboard = Arc::new(dashboard(&transport));
        login(&dashboard).await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let dashboard = dashboard.clone();
                let device_id = if i % 2 == 0 { "d1" } else { "d2" };
                tokio::spawn(async move {
                    let _ = dashboard.select_device(device_id).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // 最后生效的选择、监管器上的连接和状态登记的代次三者一致
        let selected = dashboard.with_state(|s| s.selected_device().map(str::to_string));
        assert_eq!(
            dashboard.streams().current_channel(ChannelKind::Sensor),
            selected.map(Channel::Sensor)
        );
        let generation = dashboard.streams().current_generation(ChannelKind::Sensor).unwrap();
        assert!(dashboard.with_state(|s| s.accepts(ChannelKind::Sensor, generation)));
    }

    #[tokio::test]
    async fn test_sensor_channel_follows_latest_selection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            "/sensor-data/d2/sse",
            Reply::stream(vec![sse_frame(&reading_json("d2", "Temperature", 12.5, 5))], true),
        );
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        let (first, second) = tokio::join!(dashboard.select_device("d1"), dashboard.select_device("d2"));
        assert_ok!(first);
        assert_ok!(second);

        let update = next_update(&dashboard).await;
        assert!(matches!(update.payload, StreamPayload::Reading(ref r) if r.device_id == "d2"));
        let state = dashboard.snapshot();
        assert_eq!(state.selected_device(), Some("d2"));
        assert_eq!(state.latest().get("Temperature").map(|r| r.value), Some(12.5));
    }
}

mod filters {
    use super::*;

    #[tokio::test]
    async fn test_alert_filter_outside_lookback_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;
        let before = transport.count(&Method::GET, "/alerts/d1");

        let now = Utc::now();
        let filter = AlertFilter::new("d1", now - Duration::hours(9), now - Duration::minutes(1));
        let err = assert_err!(dashboard.apply_alert_filter(filter).await);
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(transport.count(&Method::GET, "/alerts/d1"), before);

        let filter = AlertFilter::new("d1", now - Duration::hours(7), now - Duration::minutes(1));
        assert_eq!(assert_ok!(dashboard.apply_alert_filter(filter).await), 1);
        assert_eq!(transport.count(&Method::GET, "/alerts/d1"), before + 1);
    }

    #[tokio::test]
    async fn test_event_filter_for_one_device() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Viewer");
        transport.on(Method::GET, "/device-events/d2", Reply::ok(json!([])));
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        let now = Utc::now();
        let filter = EventFilter::new(
            DeviceScope::One("d2".to_string()),
            now - Duration::days(10),
            now - Duration::minutes(1),
        );
        assert_eq!(assert_ok!(dashboard.apply_event_filter(filter.clone()).await), 0);

        let state = dashboard.snapshot();
        assert!(state.events().is_empty());
        assert_eq!(state.event_filter(), Some(&filter));

        let too_early = EventFilter::new(DeviceScope::All, now - Duration::days(32), now);
        assert!(dashboard.apply_event_filter(too_early).await.is_err());
        assert_eq!(transport.count(&Method::GET, "/device-events"), 1);
    }
}

mod permissions {
    use super::*;

    #[tokio::test]
    async fn test_viewer_cannot_edit() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        let err = assert_err!(dashboard.add_threshold(&Threshold::new("Pressure", 1.0, 2.0)).await);
        assert!(matches!(err, ClientError::Forbidden(_)));
        assert!(dashboard.delete_device("d1").await.is_err());
        assert!(dashboard.delete_forecast_config("Temperature").await.is_err());

        assert_eq!(transport.count(&Method::POST, "/sensor-thresholds"), 0);
        assert_eq!(transport.count(&Method::DELETE, "/devices/d1"), 0);
        assert_eq!(transport.count(&Method::DELETE, "/sensor-forecast-configs/Temperature"), 0);
    }

    #[tokio::test]
    async fn test_invalid_values_send_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Admin");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;
        let before = transport.plain_request_count();

        let err = assert_err!(dashboard.add_threshold(&Threshold::new("Temperature", 10.0, 5.0)).await);
        assert!(matches!(err, ClientError::Validation(ref m) if m == "最小值必须小于最大值"));

        let err = assert_err!(dashboard.update_forecast_config(&ForecastConfig::new("Temperature", 0)).await);
        assert!(matches!(err, ClientError::Validation(_)));

        assert_eq!(transport.plain_request_count(), before, "校验失败不应发出请求");
    }

    #[tokio::test]
    async fn test_editor_adds_threshold_and_list_refreshes() {
        let transport = Arc::new(ScriptedTransport::new());
        script_backend(&transport, "Editor");
        transport.on(
            Method::GET,
            "/sensor-thresholds",
            Reply::ok(json!([
                { "sensorType": "Temperature", "minValue": 10, "maxValue": 40 },
                { "sensorType": "Humidity", "minValue": "20", "maxValue": "80" }
            ])),
        );
        transport.on(Method::POST, "/sensor-thresholds", Reply::Status(201));
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        assert_ok!(dashboard.add_threshold(&Threshold::new("Humidity", 20.0, 80.0)).await);

        assert_eq!(dashboard.with_state(|s| s.thresholds().len()), 2);
        assert_eq!(transport.count(&Method::POST, "/sensor-thresholds"), 1);
    }
}

mod live_updates {
    use super::*;

    #[tokio::test]
    async fn test_alerts_are_prepended_and_garbage_dropped() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            "/alerts/sse",
            Reply::stream(
                vec![
                    sse_frame(&alert_json("d1", "第一条")),
                    "data: {broken\n\n".to_string(),
                    sse_frame(&alert_json("d2", "第二条")),
                ],
                true,
            ),
        );
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        let first = next_update(&dashboard).await;
        assert!(matches!(first.payload, StreamPayload::Alert(ref a) if a.message == "第一条"));
        let second = next_update(&dashboard).await;
        assert!(matches!(second.payload, StreamPayload::Alert(ref a) if a.message == "第二条"));

        let messages: Vec<String> = dashboard.with_state(|s| s.alerts().iter().map(|a| a.message.clone()).collect());
        assert_eq!(messages, vec!["第二条", "第一条", "温度过高"]);
    }

    #[tokio::test]
    async fn test_alert_stream_keeps_newest_hundred() {
        let transport = Arc::new(ScriptedTransport::new());
        let frames: String = (0..105)
            .map(|i| sse_frame(&alert_json("d1", &format!("预警 {}", i))))
            .collect();
        transport.on(Method::GET, "/alerts/sse", Reply::stream(vec![frames], true));
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        for _ in 0..105 {
            let update = next_update(&dashboard).await;
            assert_eq!(update.kind, ChannelKind::Alerts);
        }

        let messages: Vec<String> = dashboard.with_state(|s| s.alerts().iter().map(|a| a.message.clone()).collect());
        assert_eq!(messages.len(), 100);
        assert_eq!(messages[0], "预警 104", "最新的在最前");
        assert_eq!(messages[99], "预警 5");
        assert!(!messages.iter().any(|m| m == "温度过高"), "拉取的旧预警被挤出");
    }

    #[tokio::test]
    async fn test_sensor_reading_updates_latest_and_history() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            "/sensor-data/d1/sse",
            Reply::stream(
                vec![
                    sse_frame(&reading_json("d1", "Temperature", 99.5, 600)),
                    sse_frame(&reading_json("d1", "Pressure", 1.2, 600)),
                ],
                true,
            ),
        );
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        next_update(&dashboard).await;
        next_update(&dashboard).await;

        let state = dashboard.snapshot();
        assert_eq!(state.current_latest().map(|r| r.value), Some(99.5));
        assert_eq!(state.history().len(), 31);
        assert_eq!(state.history().iter().last().map(|r| r.value), Some(99.5));
        assert_eq!(state.latest().get("Pressure").map(|r| r.value), Some(1.2));
        assert_eq!(state.sensor_types().len(), 2, "推送不改变传感器类型列表");
    }

    #[tokio::test]
    async fn test_server_closing_stream_is_reported() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/device-events/sse", Reply::stream(Vec::new(), false));
        script_backend(&transport, "Viewer");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;

        let update = next_update(&dashboard).await;
        assert_eq!(update.kind, ChannelKind::DeviceEvents);
        assert!(matches!(update.payload, StreamPayload::Closed { .. }));
        assert!(!dashboard.with_state(|s| s.is_channel_live(ChannelKind::DeviceEvents)));
        assert!(!dashboard.streams().is_open(ChannelKind::DeviceEvents));
        assert!(dashboard.streams().is_open(ChannelKind::Alerts));
    }
}

mod sign_out {
    use super::*;

    #[tokio::test]
    async fn test_logout_closes_everything_even_if_request_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::POST, "/auth/logout", Reply::Network);
        script_backend(&transport, "Admin");
        let dashboard = dashboard(&transport);
        login(&dashboard).await;
        let mut auth_rx = dashboard.session().subscribe();

        dashboard.logout().await;

        assert!(!dashboard.session().is_authenticated());
        assert_eq!(*auth_rx.borrow_and_update(), AuthState::SignedOut);
        assert!(!dashboard.streams().is_open(ChannelKind::Alerts));
        assert!(!dashboard.streams().is_open(ChannelKind::DeviceEvents));
        assert!(!dashboard.streams().is_open(ChannelKind::Sensor));

        let state = dashboard.snapshot();
        assert!(state.user().is_none());
        assert!(state.devices().is_empty());
        assert!(state.alerts().is_empty());
        assert!(state.selected_device().is_none());
    }
}
