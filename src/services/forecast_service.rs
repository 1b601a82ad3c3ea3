//! 预测配置服务

use reqwest::Method;
use std::sync::Arc;
use tracing::info;

use crate::errors::ClientError;
use crate::models::ForecastConfig;
use crate::services::{ApiClient, RequestBody};
use crate::utils::validate_required;

/// 预测配置服务
pub struct ForecastService {
    api: Arc<ApiClient>,
}

impl ForecastService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<ForecastConfig>, ClientError> {
        Ok(self
            .api
            .get_optional::<Vec<ForecastConfig>>(&["sensor-forecast-configs"], &[])
            .await?
            .unwrap_or_default())
    }

    /// 新增预测配置（multipart sensorType / hoursWindow）
    pub async fn create(&self, config: &ForecastConfig) -> Result<(), ClientError> {
        config.check()?;

        self.api
            .mutate(
                Method::POST,
                &["sensor-forecast-configs"],
                RequestBody::Form(config.create_form_fields()),
            )
            .await?;

        info!(sensor_type = %config.sensor_type, hours = config.hours_window, "预测配置已新增");
        Ok(())
    }

    /// 更新预测时间窗（multipart hoursWindow）
    pub async fn update(&self, config: &ForecastConfig) -> Result<(), ClientError> {
        config.check()?;

        self.api
            .mutate(
                Method::PATCH,
                &["sensor-forecast-configs", config.sensor_type.as_str()],
                RequestBody::Form(config.update_form_fields()),
            )
            .await?;

        info!(sensor_type = %config.sensor_type, hours = config.hours_window, "预测配置已更新");
        Ok(())
    }

    pub async fn delete(&self, sensor_type: &str) -> Result<(), ClientError> {
        validate_required(sensor_type, "传感器类型")?;

        self.api
            .mutate(Method::DELETE, &["sensor-forecast-configs", sensor_type], RequestBody::Empty)
            .await?;

        info!(sensor_type = %sensor_type, "预测配置已删除");
        Ok(())
    }
}
