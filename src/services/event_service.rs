//! 设备事件查询服务

use std::sync::Arc;

use crate::errors::ClientError;
use crate::models::{DeviceEvent, TimeWindow};
use crate::services::ApiClient;

/// 设备事件查询服务
pub struct EventService {
    api: Arc<ApiClient>,
}

impl EventService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// 查询时间窗内的事件，`device_id` 为 None 时查询全部设备
    pub async fn list(
        &self,
        device_id: Option<&str>,
        window: &TimeWindow,
    ) -> Result<Vec<DeviceEvent>, ClientError> {
        let segments: Vec<&str> = match device_id {
            Some(id) => vec!["device-events", id],
            None => vec!["device-events"],
        };

        Ok(self
            .api
            .get_optional::<Vec<DeviceEvent>>(&segments, &window.query_pairs())
            .await?
            .unwrap_or_default())
    }
}
