//! 通道监管器
//!
//! 持有 通道种类 -> 连接句柄 的映射，保证每种通道最多一条连接。
//! `open` 会先关闭同种类的旧连接；`close` / `close_all` 可重复调用。

use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{decode_payload, Channel, ChannelKind, StreamPayload, StreamUpdate};
use super::sse::SseDecoder;
use crate::config::{ReconnectMode, StreamSettings};
use crate::errors::ClientError;
use crate::services::{ApiClient, ByteStream};

/// 断线后的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// 关闭通道，等待下一次显式打开
    #[default]
    Manual,
    /// 指数退避重连
    Backoff {
        base_delay_ms: u64,
        max_delay_ms: u64,
        /// 0 表示不限次数
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &StreamSettings) -> Self {
        match settings.reconnect {
            ReconnectMode::Manual => ReconnectPolicy::Manual,
            ReconnectMode::Backoff => ReconnectPolicy::Backoff {
                base_delay_ms: settings.base_delay_ms,
                max_delay_ms: settings.max_delay_ms,
                max_attempts: settings.max_attempts,
            },
        }
    }

    /// 第 `attempt` 次重连前的等待时间，None 表示不再重连
    ///
    /// attempt=1 -> base, attempt=2 -> 2*base, attempt=3 -> 4*base，封顶 max。
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Manual => None,
            ReconnectPolicy::Backoff {
                base_delay_ms,
                max_delay_ms,
                max_attempts,
            } => {
                if max_attempts > 0 && attempt > max_attempts {
                    return None;
                }
                let exponent = attempt.saturating_sub(1).min(10);
                let delay = base_delay_ms.saturating_mul(1u64 << exponent).min(max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// 通道连接句柄
struct ChannelHandle {
    id: Uuid,
    generation: u64,
    channel: Channel,
    task: JoinHandle<()>,
}

type ChannelMap = Arc<Mutex<HashMap<ChannelKind, ChannelHandle>>>;

/// 通道监管器
pub struct StreamSupervisor {
    api: Arc<ApiClient>,
    policy: ReconnectPolicy,
    channels: ChannelMap,
    next_generation: AtomicU64,
    updates: mpsc::UnboundedSender<StreamUpdate>,
}

impl StreamSupervisor {
    /// 创建监管器，返回推送接收端
    pub fn new(
        api: Arc<ApiClient>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<StreamUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            api,
            policy,
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            updates,
        };
        (supervisor, rx)
    }

    /// 打开通道，同种类的旧连接先被关闭。返回新连接的代次
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn open(&self, channel: Channel) -> u64 {
        let generation = self.reserve_generation();
        self.open_reserved(channel, generation);
        generation
    }

    /// 预留下一个代次，之后交给 [`open_reserved`](Self::open_reserved) 使用
    pub fn reserve_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// 用预留的代次打开通道
    ///
    /// 同种类已有更新代次的连接时不做任何事并返回 false，代次只会前进。
    pub fn open_reserved(&self, channel: Channel, generation: u64) -> bool {
        let kind = channel.kind();
        let id = Uuid::new_v4();

        let mut channels = self.channels.lock();
        if let Some(current) = channels.get(&kind) {
            if current.generation > generation {
                debug!(channel = %kind, generation, current = current.generation, "已有更新的连接，放弃打开");
                return false;
            }
        }
        if let Some(old) = channels.remove(&kind) {
            old.task.abort();
            debug!(channel = %kind, connection_id = %old.id, "替换旧连接");
        }

        let task = tokio::spawn(run_channel(
            self.api.clone(),
            channel.clone(),
            generation,
            self.policy,
            self.updates.clone(),
            self.channels.clone(),
        ));

        info!(channel = %kind, connection_id = %id, generation, "打开数据流通道");
        channels.insert(
            kind,
            ChannelHandle {
                id,
                generation,
                channel,
                task,
            },
        );

        true
    }

    /// 关闭通道，返回是否确实关闭了一条连接
    pub fn close(&self, kind: ChannelKind) -> bool {
        let handle = self.channels.lock().remove(&kind);
        match handle {
            Some(handle) => {
                handle.task.abort();
                info!(channel = %kind, connection_id = %handle.id, "关闭数据流通道");
                true
            }
            None => false,
        }
    }

    /// 只在该代次仍是当前连接时关闭
    pub fn close_generation(&self, kind: ChannelKind, generation: u64) -> bool {
        let handle = {
            let mut channels = self.channels.lock();
            match channels.get(&kind) {
                Some(h) if h.generation == generation => channels.remove(&kind),
                _ => None,
            }
        };
        match handle {
            Some(handle) => {
                handle.task.abort();
                info!(channel = %kind, connection_id = %handle.id, generation, "关闭数据流通道");
                true
            }
            None => false,
        }
    }

    /// 关闭全部通道
    pub fn close_all(&self) {
        let handles: Vec<ChannelHandle> = self.channels.lock().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.task.abort();
        }
        if !handles.is_empty() {
            info!(count = handles.len(), "已关闭全部数据流通道");
        }
    }

    pub fn is_open(&self, kind: ChannelKind) -> bool {
        self.channels.lock().contains_key(&kind)
    }

    /// 该代次是否仍是此种类的当前连接
    pub fn is_current(&self, kind: ChannelKind, generation: u64) -> bool {
        self.channels
            .lock()
            .get(&kind)
            .map(|h| h.generation == generation)
            .unwrap_or(false)
    }

    /// 当前连接的代次
    pub fn current_generation(&self, kind: ChannelKind) -> Option<u64> {
        self.channels.lock().get(&kind).map(|h| h.generation)
    }

    /// 当前打开的通道
    pub fn current_channel(&self, kind: ChannelKind) -> Option<Channel> {
        self.channels.lock().get(&kind).map(|h| h.channel.clone())
    }
}

impl Drop for StreamSupervisor {
    fn drop(&mut self) {
        for (_, handle) in self.channels.lock().drain() {
            handle.task.abort();
        }
    }
}

/// 单条通道的后台任务
async fn run_channel(
    api: Arc<ApiClient>,
    channel: Channel,
    generation: u64,
    policy: ReconnectPolicy,
    updates: mpsc::UnboundedSender<StreamUpdate>,
    channels: ChannelMap,
) {
    let kind = channel.kind();
    let segments = channel.path_segments();
    let mut attempt = 0u32;

    let reason = loop {
        let outcome = match api.open_stream(&segments).await {
            Ok(body) => {
                attempt = 0;
                debug!(channel = %kind, generation, "数据流已连接");
                pump(body, kind, generation, &updates).await
            }
            Err(e) => Err(e),
        };

        if updates.is_closed() {
            return;
        }

        let (reason, retryable) = match outcome {
            Ok(()) => ("服务端结束了数据流".to_string(), true),
            Err(e) => {
                warn!(channel = %kind, generation, error = %e, "数据流出错");
                let retryable = !e.is_unauthorized();
                (e.to_string(), retryable)
            }
        };

        if !retryable {
            break reason;
        }

        attempt += 1;
        match policy.delay_for(attempt) {
            Some(delay) => {
                warn!(channel = %kind, attempt, delay_ms = delay.as_millis() as u64, "准备重连");
                tokio::time::sleep(delay).await;
            }
            None => break reason,
        }
    };

    // 只移除属于自己的句柄
    {
        let mut map = channels.lock();
        if map.get(&kind).map(|h| h.generation) == Some(generation) {
            map.remove(&kind);
        }
    }

    info!(channel = %kind, generation, reason = %reason, "数据流通道已关闭");
    let _ = updates.send(StreamUpdate {
        kind,
        generation,
        payload: StreamPayload::Closed { reason },
    });
}

/// 读取并分发消息，直到连接结束或出错
async fn pump(
    mut body: ByteStream,
    kind: ChannelKind,
    generation: u64,
    updates: &mpsc::UnboundedSender<StreamUpdate>,
) -> Result<(), ClientError> {
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            if !event.is_message() {
                debug!(channel = %kind, event = ?event.event, "忽略命名事件");
                continue;
            }

            match decode_payload(kind, &event.data) {
                Ok(payload) => {
                    let update = StreamUpdate {
                        kind,
                        generation,
                        payload,
                    };
                    if updates.send(update).is_err() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(channel = %kind, error = %e, "丢弃无法解析的消息");
                }
            }
        }
    }

    Ok(())
}
