//! 通用数据结构

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::utils::format_iso8601;

/// 单个对象或数组
///
/// 部分接口（最新读数、分析数据）可能返回单个对象，也可能返回数组。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// 历史数据响应：`{ "data": [...] }`、数组或单个对象
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataEnvelope<T> {
    Wrapped { data: Vec<T> },
    Bare(OneOrMany<T>),
}

impl<T> DataEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            DataEnvelope::Wrapped { data } => data,
            DataEnvelope::Bare(inner) => inner.into_vec(),
        }
    }
}

/// 查询时间窗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// 查询参数 `start` / `end`
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("start", format_iso8601(&self.start)),
            ("end", format_iso8601(&self.end)),
        ]
    }
}
