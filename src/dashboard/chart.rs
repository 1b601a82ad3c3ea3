//! 图表序列

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::SensorReading;
use crate::utils::format_time_of_day;

/// 图表上的一个点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// 本地时区 HH:MM
    pub label: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// 取历史中最后 `points` 个读数，保持时间顺序
pub fn derive_chart_series<'a, I>(history: I, points: usize, tz: Tz) -> Vec<ChartPoint>
where
    I: IntoIterator<Item = &'a SensorReading>,
{
    let readings: Vec<&SensorReading> = history.into_iter().collect();
    let skip = readings.len().saturating_sub(points);

    readings
        .into_iter()
        .skip(skip)
        .map(|r| ChartPoint {
            label: format_time_of_day(&r.timestamp, tz),
            value: r.value,
            timestamp: r.timestamp,
        })
        .collect()
}
