//! 预警查询服务

use std::sync::Arc;

use crate::errors::ClientError;
use crate::models::{Alert, TimeWindow};
use crate::services::ApiClient;

/// 预警查询服务
pub struct AlertService {
    api: Arc<ApiClient>,
}

impl AlertService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// 查询设备在时间窗内的预警
    pub async fn list(&self, device_id: &str, window: &TimeWindow) -> Result<Vec<Alert>, ClientError> {
        Ok(self
            .api
            .get_optional::<Vec<Alert>>(&["alerts", device_id], &window.query_pairs())
            .await?
            .unwrap_or_default())
    }
}
