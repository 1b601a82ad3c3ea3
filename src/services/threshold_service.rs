//! 传感器阈值服务

use reqwest::Method;
use std::sync::Arc;
use tracing::info;

use crate::errors::ClientError;
use crate::models::Threshold;
use crate::services::{ApiClient, RequestBody};
use crate::utils::validate_required;

/// 传感器阈值服务
pub struct ThresholdService {
    api: Arc<ApiClient>,
}

impl ThresholdService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<Threshold>, ClientError> {
        Ok(self
            .api
            .get_optional::<Vec<Threshold>>(&["sensor-thresholds"], &[])
            .await?
            .unwrap_or_default())
    }

    /// 新增阈值（JSON 请求体）
    pub async fn create(&self, threshold: &Threshold) -> Result<(), ClientError> {
        threshold.check()?;

        self.api
            .mutate(
                Method::POST,
                &["sensor-thresholds"],
                RequestBody::Json(serde_json::to_value(threshold)?),
            )
            .await?;

        info!(sensor_type = %threshold.sensor_type, "阈值已新增");
        Ok(())
    }

    /// 更新阈值（multipart minValue / maxValue）
    pub async fn update(&self, threshold: &Threshold) -> Result<(), ClientError> {
        threshold.check()?;

        self.api
            .mutate(
                Method::PATCH,
                &["sensor-thresholds", threshold.sensor_type.as_str()],
                RequestBody::Form(threshold.update_form_fields()),
            )
            .await?;

        info!(sensor_type = %threshold.sensor_type, "阈值已更新");
        Ok(())
    }

    pub async fn delete(&self, sensor_type: &str) -> Result<(), ClientError> {
        validate_required(sensor_type, "传感器类型")?;

        self.api
            .mutate(Method::DELETE, &["sensor-thresholds", sensor_type], RequestBody::Empty)
            .await?;

        info!(sensor_type = %sensor_type, "阈值已删除");
        Ok(())
    }
}
