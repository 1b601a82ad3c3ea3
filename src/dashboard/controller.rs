//! 仪表盘控制器
//!
//! 把服务调用、数据流通道和 [`DashboardState`] 串起来。状态锁只在同步片段内持有，
//! 不跨越任何 await，也不在持有期间调用监管器。

use chrono::Utc;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::filters::{AlertFilter, EventFilter};
use super::state::DashboardState;
use crate::config::{DashboardSettings, Settings};
use crate::errors::ClientError;
use crate::models::{DeviceUpdate, ForecastConfig, NewDevice, Threshold, TimeWindow, User};
use crate::security::{FileBackend, SessionStore};
use crate::services::{
    AlertService, ApiClient, AuthService, DeviceService, EventService, ForecastService,
    SensorService, ThresholdService,
};
use crate::stream::{Channel, ChannelKind, ReconnectPolicy, StreamSupervisor, StreamUpdate};
use crate::utils::utc_date_string;

/// 仪表盘控制器
pub struct Dashboard {
    session: Arc<SessionStore>,
    auth: AuthService,
    devices: DeviceService,
    sensors: SensorService,
    alerts: AlertService,
    events: EventService,
    thresholds: ThresholdService,
    forecasts: ForecastService,
    streams: StreamSupervisor,
    state: Arc<Mutex<DashboardState>>,
    updates: tokio::sync::Mutex<mpsc::UnboundedReceiver<StreamUpdate>>,
}

impl Dashboard {
    pub fn new(api: Arc<ApiClient>, settings: &DashboardSettings, policy: ReconnectPolicy) -> Self {
        let (streams, updates) = StreamSupervisor::new(api.clone(), policy);

        Self {
            session: api.session().clone(),
            auth: AuthService::new(api.clone()),
            devices: DeviceService::new(api.clone()),
            sensors: SensorService::new(api.clone()),
            alerts: AlertService::new(api.clone()),
            events: EventService::new(api.clone()),
            thresholds: ThresholdService::new(api.clone()),
            forecasts: ForecastService::new(api),
            streams,
            state: Arc::new(Mutex::new(DashboardState::new(settings))),
            updates: tokio::sync::Mutex::new(updates),
        }
    }

    /// 按配置创建：文件会话 + reqwest 传输
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let session = Arc::new(SessionStore::new(FileBackend::new(&settings.session.storage_path)));
        let api = Arc::new(ApiClient::with_reqwest(&settings.api.base_url, session)?);
        Ok(Self::new(
            api,
            &settings.dashboard,
            ReconnectPolicy::from_settings(&settings.streams),
        ))
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> DashboardState {
        self.state.lock().clone()
    }

    /// 在锁内读取状态
    pub fn with_state<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&self.state.lock())
    }

    pub fn streams(&self) -> &StreamSupervisor {
        &self.streams
    }

    // ---- 会话 ----

    /// 恢复本地会话，成功后完成初始化
    pub async fn restore(&self) -> Result<bool, ClientError> {
        if !self.session.load()? {
            return Ok(false);
        }

        match self.auth.profile().await {
            Ok(user) => {
                self.state.lock().set_user(Some(user));
            }
            Err(e) => {
                warn!(error = %e, "获取用户资料失败，清除会话");
                self.session.clear();
                return Ok(false);
            }
        }

        self.bootstrap().await;
        Ok(true)
    }

    /// 登录并完成初始化
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<User, ClientError> {
        self.auth.login(username, password).await?;

        let user = match self.auth.profile().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "获取用户资料失败，清除会话");
                self.session.clear();
                return Err(e);
            }
        };
        self.state.lock().set_user(Some(user.clone()));

        self.bootstrap().await;
        Ok(user)
    }

    /// 已认证后的初始化：打开全局通道，加载设备与参考表，应用默认筛选
    pub async fn bootstrap(&self) {
        self.open_channel(Channel::Alerts);
        self.open_channel(Channel::DeviceEvents);

        if let Err(e) = self.refresh_devices().await {
            warn!(error = %e, "加载设备列表失败");
        }
        if let Err(e) = self.refresh_thresholds().await {
            warn!(error = %e, "加载阈值失败");
        }
        if let Err(e) = self.refresh_forecast_configs().await {
            warn!(error = %e, "加载预测配置失败");
        }

        // 有设备时默认事件已随设备列表加载
        let pending_events = {
            let state = self.state.lock();
            state
                .devices()
                .is_empty()
                .then(|| state.effective_event_filter(Utc::now()))
        };
        if let Some(filter) = pending_events {
            if let Err(e) = self.load_events(filter, false).await {
                warn!(error = %e, "加载设备事件失败");
            }
        }

        info!("仪表盘初始化完成");
    }

    /// 登出：通知后端（忽略错误），关闭全部通道，清除会话与状态
    pub async fn logout(&self) {
        if let Err(e) = self.auth.logout().await {
            debug!(error = %e, "登出请求失败，继续清理本地状态");
        }
        self.handle_signed_out();
    }

    /// 会话失效后的本地清理
    pub fn handle_signed_out(&self) {
        self.streams.close_all();
        if self.session.is_authenticated() {
            self.session.clear();
        }
        let mut state = self.state.lock();
        state.channels_closed();
        state.reset();
    }

    // ---- 设备与选择 ----

    /// 重新拉取设备列表，必要时自动选择第一个设备，并重新应用默认筛选
    pub async fn refresh_devices(&self) -> Result<(), ClientError> {
        let devices = self.devices.list().await?;

        let (cleared, auto_select, defaults) = {
            let mut state = self.state.lock();
            let cleared = state.set_devices(devices);
            let auto_select = match state.selected_device() {
                Some(_) => None,
                None => state.first_device_id().map(str::to_string),
            };
            let defaults = state.device_defaults(Utc::now());
            (cleared, auto_select, defaults)
        };

        if cleared {
            self.streams.close(ChannelKind::Sensor);
            info!("已选设备不存在，清除选择");
        }

        if let Some(device_id) = auto_select {
            if let Err(e) = self.select_device(&device_id).await {
                warn!(device_id = %device_id, error = %e, "加载设备数据失败");
            }
        }

        if let Some((alert_filter, event_filter)) = defaults {
            let window = TimeWindow::new(
                alert_filter.start.unwrap_or_else(Utc::now),
                alert_filter.end.unwrap_or_else(Utc::now),
            );
            if let Err(e) = self.load_alerts(alert_filter, window).await {
                warn!(error = %e, "加载默认预警失败");
            }
            if let Err(e) = self.load_events(event_filter, false).await {
                warn!(error = %e, "加载默认设备事件失败");
            }
        }

        Ok(())
    }

    /// 选择设备：重置相关状态，替换传感器通道，加载最新读数
    pub async fn select_device(&self, device_id: &str) -> Result<(), ClientError> {
        // 选择与代次登记放在同一段锁内，后选的设备总是拿到更新的代次
        let (ticket, generation) = {
            let mut state = self.state.lock();
            let ticket = state.select_device(device_id);
            (ticket, self.register_channel(&mut state, ChannelKind::Sensor))
        };

        // open_reserved 会先中止同种类的旧连接
        self.start_channel(Channel::Sensor(device_id.to_string()), generation);

        let readings = self.sensors.latest(device_id).await?;
        let auto_type = self.state.lock().apply_latest_snapshot(ticket, readings);

        if let Some(sensor_type) = auto_type {
            self.select_sensor_type(Some(sensor_type.as_str())).await?;
        }
        Ok(())
    }

    /// 选择传感器类型：加载当天分析与历史
    pub async fn select_sensor_type(&self, sensor_type: Option<&str>) -> Result<(), ClientError> {
        let (ticket, device_id) = {
            let mut state = self.state.lock();
            let ticket = state.select_sensor_type(sensor_type.map(str::to_string));
            (ticket, state.selected_device().map(str::to_string))
        };

        let device_id = match (device_id, sensor_type) {
            (Some(device_id), Some(_)) => device_id,
            _ => return Ok(()),
        };

        let date = utc_date_string(Utc::now());
        let (analytics, history) = tokio::join!(
            self.sensors.analytics(&device_id, &date),
            self.sensors.history(&device_id)
        );

        let mut first_error = None;
        {
            let mut state = self.state.lock();
            match analytics {
                Ok(analytics) => {
                    state.apply_analytics(ticket, analytics);
                }
                Err(e) => {
                    warn!(device_id = %device_id, error = %e, "加载分析数据失败");
                    first_error = Some(e);
                }
            }
            match history {
                Ok(history) => {
                    state.apply_history(ticket, history);
                }
                Err(e) => {
                    warn!(device_id = %device_id, error = %e, "加载历史数据失败");
                    first_error = first_error.or(Some(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ---- 筛选 ----

    /// 校验并应用预警筛选，返回加载到的预警数量
    pub async fn apply_alert_filter(&self, filter: AlertFilter) -> Result<usize, ClientError> {
        let lookback = self.state.lock().limits().alert_lookback;
        let window = filter.validate(Utc::now(), lookback)?;
        self.load_alerts(filter, window).await
    }

    /// 校验并应用事件筛选，返回加载到的事件数量
    pub async fn apply_event_filter(&self, filter: EventFilter) -> Result<usize, ClientError> {
        self.load_events(filter, true).await
    }

    async fn load_alerts(&self, filter: AlertFilter, window: TimeWindow) -> Result<usize, ClientError> {
        let device_id = filter.device_id.clone();
        let ticket = self.state.lock().begin_alert_fetch(filter);

        match self.alerts.list(&device_id, &window).await {
            Ok(alerts) => {
                let count = alerts.len();
                self.state.lock().apply_alerts(ticket, alerts);
                Ok(count)
            }
            Err(e) => {
                self.state.lock().apply_alerts(ticket, Vec::new());
                Err(e)
            }
        }
    }

    async fn load_events(&self, filter: EventFilter, explicit: bool) -> Result<usize, ClientError> {
        let now = Utc::now();
        let window = if explicit {
            let lookback = self.state.lock().limits().event_lookback;
            filter.validate(now, lookback)?
        } else {
            TimeWindow::new(filter.start.unwrap_or(now), filter.end.unwrap_or(now))
        };

        let device_id = filter.device.device_id().map(str::to_string);
        let ticket = self
            .state
            .lock()
            .begin_event_fetch(if explicit { Some(filter) } else { None });

        match self.events.list(device_id.as_deref(), &window).await {
            Ok(events) => {
                let count = events.len();
                self.state.lock().apply_events(ticket, events);
                Ok(count)
            }
            Err(e) => {
                self.state.lock().apply_events(ticket, Vec::new());
                Err(e)
            }
        }
    }

    // ---- 设备管理 ----

    pub async fn add_device(&self, device: &NewDevice) -> Result<(), ClientError> {
        self.require_editor()?;
        self.devices.create(device).await?;
        self.refresh_devices().await
    }

    pub async fn update_device(&self, update: &DeviceUpdate) -> Result<(), ClientError> {
        self.require_editor()?;
        self.devices.update(update).await?;
        self.refresh_devices().await
    }

    pub async fn delete_device(&self, device_id: &str) -> Result<(), ClientError> {
        self.require_editor()?;
        self.devices.delete(device_id).await?;
        self.refresh_devices().await
    }

    // ---- 阈值与预测配置 ----

    pub async fn refresh_thresholds(&self) -> Result<(), ClientError> {
        let thresholds = self.thresholds.list().await?;
        self.state.lock().set_thresholds(thresholds);
        Ok(())
    }

    pub async fn add_threshold(&self, threshold: &Threshold) -> Result<(), ClientError> {
        self.require_editor()?;
        self.thresholds.create(threshold).await?;
        self.refresh_thresholds().await
    }

    pub async fn update_threshold(&self, threshold: &Threshold) -> Result<(), ClientError> {
        self.require_editor()?;
        self.thresholds.update(threshold).await?;
        self.refresh_thresholds().await
    }

    pub async fn delete_threshold(&self, sensor_type: &str) -> Result<(), ClientError> {
        self.require_editor()?;
        self.thresholds.delete(sensor_type).await?;
        self.refresh_thresholds().await
    }

    pub async fn refresh_forecast_configs(&self) -> Result<(), ClientError> {
        let configs = self.forecasts.list().await?;
        self.state.lock().set_forecast_configs(configs);
        Ok(())
    }

    pub async fn add_forecast_config(&self, config: &ForecastConfig) -> Result<(), ClientError> {
        self.require_editor()?;
        self.forecasts.create(config).await?;
        self.refresh_forecast_configs().await
    }

    pub async fn update_forecast_config(&self, config: &ForecastConfig) -> Result<(), ClientError> {
        self.require_editor()?;
        self.forecasts.update(config).await?;
        self.refresh_forecast_configs().await
    }

    pub async fn delete_forecast_config(&self, sensor_type: &str) -> Result<(), ClientError> {
        self.require_editor()?;
        self.forecasts.delete(sensor_type).await?;
        self.refresh_forecast_configs().await
    }

    // ---- 推送 ----

    /// 等待下一条被接受的推送并合并到状态
    ///
    /// 过期代次的推送被静默丢弃。监管器存在期间不会返回 None。
    pub async fn next_update(&self) -> Option<StreamUpdate> {
        let mut updates = self.updates.lock().await;
        loop {
            let update = updates.recv().await?;
            if self.state.lock().apply_update(update.clone()) {
                return Some(update);
            }
            debug!(channel = %update.kind, generation = update.generation, "丢弃过期推送");
        }
    }

    /// 关闭全部通道（视图卸载）
    pub fn close(&self) {
        self.streams.close_all();
        self.state.lock().channels_closed();
    }

    /// 打开全局通道（预警、事件）
    fn open_channel(&self, channel: Channel) {
        let generation = {
            let mut state = self.state.lock();
            self.register_channel(&mut state, channel.kind())
        };
        self.start_channel(channel, generation);
    }

    /// 在状态锁内预留并登记代次
    ///
    /// 预留只是监管器上的原子计数，不取监管器的锁。登记先于连接建立，
    /// 新连接的第一条推送不会被误判为过期。
    fn register_channel(&self, state: &mut DashboardState, kind: ChannelKind) -> Option<u64> {
        let generation = self.streams.reserve_generation();
        state.channel_opened(kind, generation).then_some(generation)
    }

    /// 释放状态锁之后建立连接，两把锁从不嵌套持有
    fn start_channel(&self, channel: Channel, generation: Option<u64>) {
        let kind = channel.kind();
        let generation = match generation {
            Some(generation) => generation,
            None => {
                debug!(channel = %kind, "已有更新的通道，跳过");
                return;
            }
        };

        if !self.streams.open_reserved(channel, generation) {
            return;
        }

        // 连接期间可能已切换设备或登出
        let still_wanted = self.state.lock().accepts(kind, generation);
        if !still_wanted {
            self.streams.close_generation(kind, generation);
            debug!(channel = %kind, generation, "通道在打开期间已被取代，关闭");
        }
    }

    fn require_editor(&self) -> Result<(), ClientError> {
        let allowed = self.state.lock().is_editor() || self.session.is_editor();
        if allowed {
            Ok(())
        } else {
            Err(ClientError::Forbidden("当前用户没有编辑权限".to_string()))
        }
    }
}
