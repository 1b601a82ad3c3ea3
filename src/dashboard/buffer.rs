//! 有界缓冲区

use std::collections::VecDeque;

use crate::models::SensorReading;

/// 新消息在前的有界缓冲（预警、事件）
#[derive(Debug, Clone)]
pub struct CappedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> CappedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 插入到最前，超出容量时丢弃最旧的
    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    /// 整体替换（保持服务端给出的顺序，只保留前 capacity 条）
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items.into_iter().take(self.capacity).collect();
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 从新到旧遍历
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> CappedBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// 按到达顺序排列的有界缓冲（传感器历史）
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加到末尾，超出容量时丢弃最旧的
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// 整体替换，只保留最后 capacity 个
    pub fn replace(&mut self, items: Vec<T>) {
        let skip = items.len().saturating_sub(self.capacity);
        self.items = items.into_iter().skip(skip).collect();
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 从旧到新遍历
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// 最后 n 个，保持原顺序
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }
}

impl<T: Clone> RollingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// 各传感器类型的最新读数，每种类型一条
///
/// 替换已有类型时该条目移到末尾。
#[derive(Debug, Clone, Default)]
pub struct LatestReadings {
    entries: Vec<SensorReading>,
}

impl LatestReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, reading: SensorReading) {
        self.entries.retain(|r| r.sensor_type != reading.sensor_type);
        self.entries.push(reading);
    }

    /// 用快照替换全部内容
    pub fn replace_all(&mut self, readings: impl IntoIterator<Item = SensorReading>) {
        self.entries.clear();
        for reading in readings {
            self.upsert(reading);
        }
    }

    pub fn get(&self, sensor_type: &str) -> Option<&SensorReading> {
        self.entries.iter().find(|r| r.sensor_type == sensor_type)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.entries.iter()
    }
}

/// 按首次出现顺序去重的传感器类型
pub fn distinct_sensor_types<'a>(readings: impl IntoIterator<Item = &'a SensorReading>) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for reading in readings {
        if !types.iter().any(|t| t == &reading.sensor_type) {
            types.push(reading.sensor_type.clone());
        }
    }
    types
}
