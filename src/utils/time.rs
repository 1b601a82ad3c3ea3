//! 时间处理工具

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// 今天的日期（UTC），格式 YYYY-MM-DD，用于分析数据查询
pub fn utc_date_string(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// 格式化为 ISO 8601
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// 解析时间字符串
///
/// 接受 RFC 3339；不带时区的 ISO 8601 按 UTC 处理。
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

/// 时分标签（图表横轴）
pub fn format_time_of_day(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%H:%M").to_string()
}

/// 完整日期时间（列表展示）
pub fn format_local_datetime(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%d/%m/%Y %H:%M:%S").to_string()
}

/// 宽松时间戳的 serde 适配
pub mod flexible_datetime {
    use super::{format_iso8601, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_iso8601(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(|e| D::Error::custom(format!("无效的时间格式 {}: {}", raw, e)))
    }

    /// 可选字段版本
    pub mod option {
        use super::super::{format_iso8601, parse_timestamp};
        use chrono::{DateTime, Utc};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_some(&format_iso8601(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.is_empty() => parse_timestamp(&raw)
                    .map(Some)
                    .map_err(|e| D::Error::custom(format!("无效的时间格式 {}: {}", raw, e))),
                _ => Ok(None),
            }
        }
    }
}
