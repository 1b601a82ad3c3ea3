//! 数据流通道集成测试

use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use iotboard::services::ApiClient;
use iotboard::stream::{
    Channel, ChannelKind, ReconnectPolicy, StreamPayload, StreamSupervisor, StreamUpdate,
};

use crate::helpers::*;
use crate::mocks::{Reply, ScriptedTransport};

fn supervisor(
    transport: &Arc<ScriptedTransport>,
    policy: ReconnectPolicy,
) -> (StreamSupervisor, UnboundedReceiver<StreamUpdate>) {
    let api = ApiClient::new(BASE_URL, transport.clone(), signed_in_session()).unwrap();
    StreamSupervisor::new(Arc::new(api), policy)
}

fn fast_backoff(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy::Backoff {
        base_delay_ms: 5,
        max_delay_ms: 20,
        max_attempts,
    }
}

async fn recv(rx: &mut UnboundedReceiver<StreamUpdate>) -> StreamUpdate {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("等待推送超时")
        .expect("推送通道已关闭")
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_one_connection_per_kind() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/sensor-data/d1/sse", Reply::idle_stream());
        transport.on(Method::GET, "/sensor-data/d2/sse", Reply::idle_stream());
        let (streams, _rx) = supervisor(&transport, ReconnectPolicy::Manual);

        let first = streams.open(Channel::Sensor("d1".to_string()));
        let second = streams.open(Channel::Sensor("d2".to_string()));

        assert!(second > first);
        assert!(!streams.is_current(ChannelKind::Sensor, first));
        assert!(streams.is_current(ChannelKind::Sensor, second));
        assert_eq!(
            streams.current_channel(ChannelKind::Sensor),
            Some(Channel::Sensor("d2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_older_reservation_never_replaces_newer() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/sensor-data/d1/sse", Reply::idle_stream());
        transport.on(Method::GET, "/sensor-data/d2/sse", Reply::idle_stream());
        let (streams, _rx) = supervisor(&transport, ReconnectPolicy::Manual);

        let older = streams.reserve_generation();
        let newer = streams.reserve_generation();
        assert!(newer > older);

        assert!(streams.open_reserved(Channel::Sensor("d2".to_string()), newer));
        assert!(!streams.open_reserved(Channel::Sensor("d1".to_string()), older));
        assert_eq!(streams.current_generation(ChannelKind::Sensor), Some(newer));
        assert_eq!(
            streams.current_channel(ChannelKind::Sensor),
            Some(Channel::Sensor("d2".to_string()))
        );

        assert!(!streams.close_generation(ChannelKind::Sensor, older));
        assert!(streams.is_open(ChannelKind::Sensor));
        assert!(streams.close_generation(ChannelKind::Sensor, newer));
        assert!(!streams.is_open(ChannelKind::Sensor));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/alerts/sse", Reply::idle_stream());
        let (streams, _rx) = supervisor(&transport, ReconnectPolicy::Manual);

        assert!(!streams.close(ChannelKind::Alerts));

        streams.open(Channel::Alerts);
        assert!(streams.is_open(ChannelKind::Alerts));
        assert!(streams.close(ChannelKind::Alerts));
        assert!(!streams.close(ChannelKind::Alerts));
        assert!(!streams.is_open(ChannelKind::Alerts));

        streams.close_all();
        streams.close_all();
    }

    #[tokio::test]
    async fn test_named_events_and_garbage_skipped() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            "/alerts/sse",
            Reply::stream(
                vec![
                    ": keep-alive\n\n".to_string(),
                    "event: ping\ndata: {}\n\n".to_string(),
                    "data: not-json\n\n".to_string(),
                    sse_frame(&alert_json("d1", "有效")),
                ],
                true,
            ),
        );
        let (streams, mut rx) = supervisor(&transport, ReconnectPolicy::Manual);
        let generation = streams.open(Channel::Alerts);

        let update = recv(&mut rx).await;
        assert_eq!(update.kind, ChannelKind::Alerts);
        assert_eq!(update.generation, generation);
        assert!(matches!(update.payload, StreamPayload::Alert(ref a) if a.message == "有效"));
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let transport = Arc::new(ScriptedTransport::new());
        let frame = sse_frame(&event_json("d3", "Offline"));
        let (head, tail) = frame.split_at(12);
        transport.on(
            Method::GET,
            "/device-events/sse",
            Reply::stream(vec![head.to_string(), tail.to_string()], true),
        );
        let (streams, mut rx) = supervisor(&transport, ReconnectPolicy::Manual);
        streams.open(Channel::DeviceEvents);

        let update = recv(&mut rx).await;
        assert!(matches!(update.payload, StreamPayload::Event(ref e) if e.event_type == "Offline"));
    }
}

mod reconnect {
    use super::*;

    #[tokio::test]
    async fn test_manual_policy_reports_close() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/alerts/sse", Reply::Network);
        let (streams, mut rx) = supervisor(&transport, ReconnectPolicy::Manual);
        streams.open(Channel::Alerts);

        let update = recv(&mut rx).await;
        assert!(matches!(update.payload, StreamPayload::Closed { .. }));
        assert!(!streams.is_open(ChannelKind::Alerts));
        assert_eq!(transport.count(&Method::GET, "/alerts/sse"), 1);
    }

    #[tokio::test]
    async fn test_backoff_reconnects_until_connected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on(Method::GET, "/alerts/sse", Reply::Network)
            .on(Method::GET, "/alerts/sse", Reply::Status(502))
            .on(
                Method::GET,
                "/alerts/sse",
                Reply::stream(vec![sse_frame(&alert_json("d1", "重连后"))], true),
            );
        let (streams, mut rx) = supervisor(&transport, fast_backoff(5));
        streams.open(Channel::Alerts);

        let update = recv(&mut rx).await;
        assert!(matches!(update.payload, StreamPayload::Alert(ref a) if a.message == "重连后"));
        assert_eq!(transport.count(&Method::GET, "/alerts/sse"), 3);
        assert!(streams.is_open(ChannelKind::Alerts));
    }

    #[tokio::test]
    async fn test_backoff_gives_up_after_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/alerts/sse", Reply::Network);
        let (streams, mut rx) = supervisor(&transport, fast_backoff(2));
        streams.open(Channel::Alerts);

        let update = recv(&mut rx).await;
        assert!(matches!(update.payload, StreamPayload::Closed { .. }));
        assert_eq!(transport.count(&Method::GET, "/alerts/sse"), 3, "首次连接 + 2 次重连");
        assert!(!streams.is_open(ChannelKind::Alerts));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, "/alerts/sse", Reply::Status(401));
        transport.on(Method::POST, "/auth/refresh", Reply::Status(401));
        let (streams, mut rx) = supervisor(&transport, fast_backoff(5));
        streams.open(Channel::Alerts);

        let update = recv(&mut rx).await;
        assert!(matches!(update.payload, StreamPayload::Closed { .. }));
        assert_eq!(transport.count(&Method::GET, "/alerts/sse"), 1);
        assert_eq!(transport.count(&Method::POST, "/auth/refresh"), 1);
    }
}
