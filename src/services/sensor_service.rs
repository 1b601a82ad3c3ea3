//! 传感器数据服务

use std::sync::Arc;

use crate::errors::ClientError;
use crate::models::{Analytics, DataEnvelope, OneOrMany, SensorReading};
use crate::services::ApiClient;

/// 传感器数据服务
pub struct SensorService {
    api: Arc<ApiClient>,
}

impl SensorService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// 设备各传感器类型的最新读数（单个对象或数组）
    pub async fn latest(&self, device_id: &str) -> Result<Vec<SensorReading>, ClientError> {
        Ok(self
            .api
            .get_optional::<OneOrMany<SensorReading>>(&["sensor-data", device_id, "latest"], &[])
            .await?
            .map(OneOrMany::into_vec)
            .unwrap_or_default())
    }

    /// 设备全部历史读数（按后端返回顺序）
    pub async fn history(&self, device_id: &str) -> Result<Vec<SensorReading>, ClientError> {
        Ok(self
            .api
            .get_optional::<DataEnvelope<SensorReading>>(&["sensor-data", device_id], &[])
            .await?
            .map(DataEnvelope::into_vec)
            .unwrap_or_default())
    }

    /// 指定日期（YYYY-MM-DD）的分析结果
    pub async fn analytics(&self, device_id: &str, date: &str) -> Result<Vec<Analytics>, ClientError> {
        Ok(self
            .api
            .get_optional::<OneOrMany<Analytics>>(&["analytics", device_id], &[("date", date.to_string())])
            .await?
            .map(OneOrMany::into_vec)
            .unwrap_or_default())
    }
}
