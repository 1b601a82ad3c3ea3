//! 数值处理工具

/// 传感器数值显示格式
///
/// 非零且绝对值 < 0.01 保留 6 位小数，非零且 < 1 保留 4 位，其余保留 2 位。
pub fn format_sensor_value(value: f64) -> String {
    // -0.0 按 0 处理，避免输出 "-0.00"
    let value = if value == 0.0 { 0.0 } else { value };
    let magnitude = value.abs();

    if value != 0.0 && magnitude < 0.01 {
        format!("{:.6}", value)
    } else if value != 0.0 && magnitude < 1.0 {
        format!("{:.4}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// 数值字段的宽松反序列化：接受 JSON 数字或数字字符串
pub mod lenient_f64 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("无效的数值: {}", s))),
        }
    }

    /// 可选字段版本
    pub mod option {
        use super::Raw;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_some(v),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
            match Option::<Raw>::deserialize(deserializer)? {
                None => Ok(None),
                Some(Raw::Number(n)) => Ok(Some(n)),
                Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
                Some(Raw::Text(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| D::Error::custom(format!("无效的数值: {}", s))),
            }
        }
    }
}
