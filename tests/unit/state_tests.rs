//! 仪表盘状态单元测试

use chrono::Duration;

use iotboard::config::DashboardSettings;
use iotboard::dashboard::DashboardState;
use iotboard::stream::{ChannelKind, StreamPayload, StreamUpdate};

use crate::helpers::*;

fn state_with_capacity(capacity: usize) -> DashboardState {
    let settings = DashboardSettings {
        buffer_capacity: capacity,
        ..DashboardSettings::default()
    };
    DashboardState::new(&settings)
}

fn update(kind: ChannelKind, generation: u64, payload: StreamPayload) -> StreamUpdate {
    StreamUpdate {
        kind,
        generation,
        payload,
    }
}

mod buffers {
    use super::*;

    #[test]
    fn test_alert_buffer_keeps_newest() {
        let mut state = state_with_capacity(3);
        state.channel_opened(ChannelKind::Alerts, 1);

        for i in 0..5 {
            let accepted = state.apply_update(update(
                ChannelKind::Alerts,
                1,
                StreamPayload::Alert(alert("d1", &format!("a{}", i))),
            ));
            assert!(accepted);
        }

        let messages: Vec<String> = state.alerts().iter().map(|a| a.message.clone()).collect();
        assert_eq!(messages, vec!["a4", "a3", "a2"]);
        assert_eq!(state.alert_count(), 3);
    }

    #[test]
    fn test_history_rolls_oldest_out() {
        let mut state = state_with_capacity(3);
        let ticket = state.select_device("d1");
        state.apply_latest_snapshot(ticket, vec![reading("d1", "Temperature", 1.0, 0)]);
        state.select_sensor_type(Some("Temperature".to_string()));

        for i in 0..5 {
            state.apply_sensor_reading(reading("d1", "Temperature", i as f64, i));
        }

        let values: Vec<f64> = state.history().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }
}

mod staleness {
    use super::*;

    #[test]
    fn test_late_history_for_previous_device_is_dropped() {
        let mut state = state_with_capacity(100);
        let ticket_a = state.select_device("A");
        state.apply_latest_snapshot(ticket_a, vec![reading("A", "Temperature", 1.0, 0)]);
        let history_ticket = state.select_sensor_type(Some("Temperature".to_string()));

        state.select_device("B");
        let applied = state.apply_history(history_ticket, vec![reading("A", "Temperature", 1.0, 0)]);

        assert!(!applied);
        assert!(state.history().is_empty(), "旧设备的历史不应出现");
    }

    #[test]
    fn test_updates_from_replaced_channel_are_ignored() {
        let mut state = state_with_capacity(100);
        state.select_device("B");
        state.channel_opened(ChannelKind::Sensor, 7);

        let stale = update(
            ChannelKind::Sensor,
            6,
            StreamPayload::Reading(reading("A", "Temperature", 99.0, 1)),
        );
        assert!(!state.apply_update(stale));
        assert!(state.latest().is_empty());
    }

    #[test]
    fn test_older_channel_registration_is_refused() {
        let mut state = state_with_capacity(100);
        assert!(state.channel_opened(ChannelKind::Sensor, 9));
        assert!(!state.channel_opened(ChannelKind::Sensor, 8));
        assert!(state.accepts(ChannelKind::Sensor, 9));
        assert!(!state.accepts(ChannelKind::Sensor, 8));
        assert!(state.channel_opened(ChannelKind::Sensor, 10));
    }

    #[test]
    fn test_closed_channel_stops_accepting() {
        let mut state = state_with_capacity(100);
        state.channel_opened(ChannelKind::DeviceEvents, 3);

        assert!(state.apply_update(update(
            ChannelKind::DeviceEvents,
            3,
            StreamPayload::Event(event("d1", "Offline")),
        )));
        assert!(state.apply_update(update(
            ChannelKind::DeviceEvents,
            3,
            StreamPayload::Closed {
                reason: "服务端结束了数据流".to_string()
            },
        )));
        assert!(!state.is_channel_live(ChannelKind::DeviceEvents));
        assert!(!state.apply_update(update(
            ChannelKind::DeviceEvents,
            3,
            StreamPayload::Event(event("d1", "Online")),
        )));
        assert_eq!(state.events().len(), 1);
    }
}

mod default_filters {
    use super::*;

    #[test]
    fn test_defaults_reapplied_on_every_device_list() {
        let mut state = state_with_capacity(100);
        let now = fixed_now();
        assert!(state.device_defaults(now).is_none(), "没有设备时不生成默认筛选");

        state.set_devices(vec![serde_json::from_value(device_json("d7")).unwrap()]);
        let (alerts, events) = state.device_defaults(now).unwrap();
        assert_eq!(alerts.device_id, "d7");
        assert_eq!(alerts.start, Some(now - Duration::hours(8)));
        assert_eq!(events.device.device_id(), None);

        state.set_devices(vec![serde_json::from_value(device_json("d8")).unwrap()]);
        let (alerts, _) = state.device_defaults(now).unwrap();
        assert_eq!(alerts.device_id, "d8");
    }

    #[test]
    fn test_default_event_window_is_one_week() {
        let state = state_with_capacity(100);
        let now = fixed_now();
        let filter = state.effective_event_filter(now);
        assert_eq!(filter.device.device_id(), None);
        assert_eq!(filter.start, Some(now - Duration::days(7)));
        assert_eq!(filter.end, Some(now));
    }
}
