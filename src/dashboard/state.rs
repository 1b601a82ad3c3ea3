//! 仪表盘状态
//!
//! 纯同步的状态机，负责把拉取的快照和推送的增量合并到一起。
//! 每次选择设备或传感器类型都会递增 `selection_generation`，发起拉取时拿到的
//! [`SelectionTicket`] 过期后，晚到的结果直接丢弃。

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

use super::buffer::{distinct_sensor_types, CappedBuffer, LatestReadings, RollingBuffer};
use super::chart::{derive_chart_series, ChartPoint};
use super::filters::{AlertFilter, EventFilter, FilterLimits};
use crate::config::DashboardSettings;
use crate::models::{
    Alert, Analytics, Device, DeviceEvent, ForecastConfig, SensorReading, Threshold, User,
};
use crate::stream::{ChannelKind, StreamPayload, StreamUpdate};

/// 选择代次凭证
///
/// 最新读数快照只和设备选择绑定；分析和历史快照还要求传感器类型未变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    device: u64,
    selection: u64,
}

/// 列表拉取凭证（预警、事件各自独立计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone)]
pub struct DashboardState {
    capacity: usize,
    chart_points: usize,
    tz: Tz,
    limits: FilterLimits,

    user: Option<User>,
    devices: Vec<Device>,
    selected_device: Option<String>,
    selected_sensor_type: Option<String>,
    sensor_types: Vec<String>,

    latest: LatestReadings,
    analytics: Vec<Analytics>,
    history: RollingBuffer<SensorReading>,
    alerts: CappedBuffer<Alert>,
    events: CappedBuffer<DeviceEvent>,
    thresholds: Vec<Threshold>,
    forecast_configs: Vec<ForecastConfig>,

    alert_filter: Option<AlertFilter>,
    event_filter: Option<EventFilter>,

    device_generation: u64,
    selection_generation: u64,
    alert_generation: u64,
    event_generation: u64,
    channel_generations: HashMap<ChannelKind, u64>,
}

impl DashboardState {
    pub fn new(settings: &DashboardSettings) -> Self {
        let capacity = settings.buffer_capacity;
        Self {
            capacity,
            chart_points: settings.chart_points,
            tz: settings.tz(),
            limits: FilterLimits::from_settings(settings),
            user: None,
            devices: Vec::new(),
            selected_device: None,
            selected_sensor_type: None,
            sensor_types: Vec::new(),
            latest: LatestReadings::new(),
            analytics: Vec::new(),
            history: RollingBuffer::new(capacity),
            alerts: CappedBuffer::new(capacity),
            events: CappedBuffer::new(capacity),
            thresholds: Vec::new(),
            forecast_configs: Vec::new(),
            alert_filter: None,
            event_filter: None,
            device_generation: 0,
            selection_generation: 0,
            alert_generation: 0,
            event_generation: 0,
            channel_generations: HashMap::new(),
        }
    }

    /// 登出后恢复初始状态（保留配置）
    pub fn reset(&mut self) {
        let device_generation = self.device_generation + 1;
        let generation = self.selection_generation + 1;
        let alert_generation = self.alert_generation + 1;
        let event_generation = self.event_generation + 1;

        *self = Self {
            capacity: self.capacity,
            chart_points: self.chart_points,
            tz: self.tz,
            limits: self.limits,
            ..Self::new(&DashboardSettings::default())
        };
        self.history = RollingBuffer::new(self.capacity);
        self.alerts = CappedBuffer::new(self.capacity);
        self.events = CappedBuffer::new(self.capacity);
        // 代次不回退，避免登出前发起的请求在下一次登录后生效
        self.device_generation = device_generation;
        self.selection_generation = generation;
        self.alert_generation = alert_generation;
        self.event_generation = event_generation;
    }

    // ---- 用户 ----

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_editor(&self) -> bool {
        self.user.as_ref().map(User::is_editor).unwrap_or(false)
    }

    // ---- 设备与选择 ----

    /// 替换设备列表。已选设备不在新列表中时清除选择，返回是否清除了选择
    pub fn set_devices(&mut self, devices: Vec<Device>) -> bool {
        self.devices = devices;

        let missing = self
            .selected_device
            .as_ref()
            .map(|id| !self.devices.iter().any(|d| &d.device_id == id))
            .unwrap_or(false);

        if missing {
            self.clear_selection();
        }
        missing
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn first_device_id(&self) -> Option<&str> {
        self.devices.first().map(|d| d.device_id.as_str())
    }

    /// 选择设备：清空传感器类型、最新读数、分析和历史
    pub fn select_device(&mut self, device_id: impl Into<String>) -> SelectionTicket {
        self.selected_device = Some(device_id.into());
        self.reset_device_scope();
        self.device_generation += 1;
        self.bump_selection()
    }

    /// 取消设备选择
    pub fn clear_selection(&mut self) -> SelectionTicket {
        self.selected_device = None;
        self.reset_device_scope();
        self.channel_generations.remove(&ChannelKind::Sensor);
        self.device_generation += 1;
        self.bump_selection()
    }

    /// 选择传感器类型：清空分析和历史，等待新的快照
    pub fn select_sensor_type(&mut self, sensor_type: Option<String>) -> SelectionTicket {
        self.selected_sensor_type = sensor_type;
        self.analytics.clear();
        self.history.clear();
        self.bump_selection()
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    pub fn selected_sensor_type(&self) -> Option<&str> {
        self.selected_sensor_type.as_deref()
    }

    pub fn sensor_types(&self) -> &[String] {
        &self.sensor_types
    }

    pub fn selection_ticket(&self) -> SelectionTicket {
        SelectionTicket {
            device: self.device_generation,
            selection: self.selection_generation,
        }
    }

    /// 设备和传感器类型都未变化
    pub fn is_current(&self, ticket: SelectionTicket) -> bool {
        ticket.selection == self.selection_generation
    }

    /// 设备未变化（传感器类型可能已变）
    pub fn is_current_device(&self, ticket: SelectionTicket) -> bool {
        ticket.device == self.device_generation
    }

    fn reset_device_scope(&mut self) {
        self.selected_sensor_type = None;
        self.sensor_types.clear();
        self.latest.clear();
        self.analytics.clear();
        self.history.clear();
    }

    fn bump_selection(&mut self) -> SelectionTicket {
        self.selection_generation += 1;
        self.selection_ticket()
    }

    // ---- 快照 ----

    /// 应用最新读数快照
    ///
    /// 返回需要自动选中的传感器类型（尚未选择类型时取第一个）。凭证过期时忽略快照并返回 None。
    pub fn apply_latest_snapshot(
        &mut self,
        ticket: SelectionTicket,
        readings: Vec<SensorReading>,
    ) -> Option<String> {
        if !self.is_current_device(ticket) {
            return None;
        }

        self.sensor_types = distinct_sensor_types(&readings);
        self.latest.replace_all(readings);

        if self.selected_sensor_type.is_none() {
            self.sensor_types.first().cloned()
        } else {
            None
        }
    }

    pub fn apply_analytics(&mut self, ticket: SelectionTicket, analytics: Vec<Analytics>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.analytics = analytics;
        true
    }

    /// 应用历史快照：只保留当前传感器类型，截断到最新 capacity 条
    pub fn apply_history(&mut self, ticket: SelectionTicket, readings: Vec<SensorReading>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        match self.selected_sensor_type.as_deref() {
            Some(sensor_type) if self.selected_device.is_some() => {
                let filtered: Vec<SensorReading> = readings
                    .into_iter()
                    .filter(|r| r.sensor_type == sensor_type)
                    .collect();
                self.history.replace(filtered);
            }
            _ => self.history.clear(),
        }
        true
    }

    // ---- 推送 ----

    /// 合并一条传感器推送
    pub fn apply_sensor_reading(&mut self, reading: SensorReading) {
        if self.selected_device.as_deref() != Some(reading.device_id.as_str()) {
            return;
        }

        let matches_selected = self.selected_sensor_type.as_deref() == Some(reading.sensor_type.as_str());
        if matches_selected {
            self.history.push(reading.clone());
        }
        self.latest.upsert(reading);
    }

    pub fn push_alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    pub fn push_event(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }

    /// 记录通道打开的代次，之后只接受该代次的推送
    ///
    /// 已登记更新的代次时忽略并返回 false。
    pub fn channel_opened(&mut self, kind: ChannelKind, generation: u64) -> bool {
        match self.channel_generations.get(&kind) {
            Some(&current) if current > generation => false,
            _ => {
                self.channel_generations.insert(kind, generation);
                true
            }
        }
    }

    pub fn channels_closed(&mut self) {
        self.channel_generations.clear();
    }

    pub fn accepts(&self, kind: ChannelKind, generation: u64) -> bool {
        self.channel_generations.get(&kind) == Some(&generation)
    }

    pub fn is_channel_live(&self, kind: ChannelKind) -> bool {
        self.channel_generations.contains_key(&kind)
    }

    /// 应用一条推送，返回是否被接受
    pub fn apply_update(&mut self, update: StreamUpdate) -> bool {
        if !self.accepts(update.kind, update.generation) {
            return false;
        }

        match update.payload {
            StreamPayload::Alert(alert) => self.push_alert(alert),
            StreamPayload::Event(event) => self.push_event(event),
            StreamPayload::Reading(reading) => self.apply_sensor_reading(reading),
            StreamPayload::Closed { .. } => {
                self.channel_generations.remove(&update.kind);
            }
        }
        true
    }

    // ---- 筛选 ----

    pub fn limits(&self) -> FilterLimits {
        self.limits
    }

    /// 设备列表非空时的默认筛选：第一个设备最近 8 小时的预警，全部设备最近 7 天的事件
    ///
    /// 每次设备列表刷新后都重新应用，之前显式设置的事件筛选随之失效。
    pub fn device_defaults(&mut self, now: DateTime<Utc>) -> Option<(AlertFilter, EventFilter)> {
        let device_id = self.first_device_id()?.to_string();
        self.event_filter = None;
        Some((
            AlertFilter::trailing(device_id, now, self.limits.alert_lookback),
            EventFilter::trailing(now, self.limits.event_default),
        ))
    }

    /// 当前生效的事件筛选，未显式设置时为默认窗口
    pub fn effective_event_filter(&self, now: DateTime<Utc>) -> EventFilter {
        self.event_filter
            .clone()
            .unwrap_or_else(|| EventFilter::trailing(now, self.limits.event_default))
    }

    pub fn begin_alert_fetch(&mut self, filter: AlertFilter) -> FetchTicket {
        self.alert_filter = Some(filter);
        self.alert_generation += 1;
        FetchTicket(self.alert_generation)
    }

    /// 替换预警列表（拉取失败时传入空列表）
    pub fn apply_alerts(&mut self, ticket: FetchTicket, alerts: Vec<Alert>) -> bool {
        if ticket.0 != self.alert_generation {
            return false;
        }
        self.alerts.replace(alerts);
        true
    }

    pub fn begin_event_fetch(&mut self, filter: Option<EventFilter>) -> FetchTicket {
        if filter.is_some() {
            self.event_filter = filter;
        }
        self.event_generation += 1;
        FetchTicket(self.event_generation)
    }

    pub fn apply_events(&mut self, ticket: FetchTicket, events: Vec<DeviceEvent>) -> bool {
        if ticket.0 != self.event_generation {
            return false;
        }
        self.events.replace(events);
        true
    }

    pub fn alert_filter(&self) -> Option<&AlertFilter> {
        self.alert_filter.as_ref()
    }

    pub fn event_filter(&self) -> Option<&EventFilter> {
        self.event_filter.as_ref()
    }

    // ---- 参考表 ----

    pub fn set_thresholds(&mut self, thresholds: Vec<Threshold>) {
        self.thresholds = thresholds;
    }

    pub fn set_forecast_configs(&mut self, configs: Vec<ForecastConfig>) {
        self.forecast_configs = configs;
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn forecast_configs(&self) -> &[ForecastConfig] {
        &self.forecast_configs
    }

    // ---- 视图查询 ----

    pub fn latest(&self) -> &LatestReadings {
        &self.latest
    }

    pub fn analytics(&self) -> &[Analytics] {
        &self.analytics
    }

    pub fn history(&self) -> &RollingBuffer<SensorReading> {
        &self.history
    }

    pub fn alerts(&self) -> &CappedBuffer<Alert> {
        &self.alerts
    }

    pub fn events(&self) -> &CappedBuffer<DeviceEvent> {
        &self.events
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn current_latest(&self) -> Option<&SensorReading> {
        self.latest.get(self.selected_sensor_type.as_deref()?)
    }

    pub fn current_analytics(&self) -> Option<&Analytics> {
        let sensor_type = self.selected_sensor_type.as_deref()?;
        self.analytics.iter().find(|a| a.sensor_type == sensor_type)
    }

    pub fn current_threshold(&self) -> Option<&Threshold> {
        let sensor_type = self.selected_sensor_type.as_deref()?;
        self.thresholds.iter().find(|t| t.sensor_type == sensor_type)
    }

    pub fn chart_series(&self) -> Vec<ChartPoint> {
        derive_chart_series(self.history.iter(), self.chart_points, self.tz)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}
