//! 设备服务

use reqwest::Method;
use std::sync::Arc;
use tracing::info;

use crate::errors::ClientError;
use crate::models::{Device, DeviceUpdate, NewDevice};
use crate::services::{ApiClient, RequestBody};
use crate::utils::validate_required;

/// 设备服务
pub struct DeviceService {
    api: Arc<ApiClient>,
}

impl DeviceService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// 查询全部设备
    pub async fn list(&self) -> Result<Vec<Device>, ClientError> {
        Ok(self
            .api
            .get_optional::<Vec<Device>>(&["devices"], &[])
            .await?
            .unwrap_or_default())
    }

    /// 注册新设备
    pub async fn create(&self, device: &NewDevice) -> Result<(), ClientError> {
        device.check()?;

        self.api
            .mutate(Method::POST, &["devices"], RequestBody::Form(device.form_fields()))
            .await?;

        info!(device_id = %device.device_id, "设备已注册");
        Ok(())
    }

    /// 更新设备（只提交非空字段）
    pub async fn update(&self, update: &DeviceUpdate) -> Result<(), ClientError> {
        validate_required(&update.device_id, "设备 ID")?;

        self.api
            .mutate(
                Method::PATCH,
                &["devices", update.device_id.as_str()],
                RequestBody::Form(update.form_fields()),
            )
            .await?;

        info!(device_id = %update.device_id, "设备已更新");
        Ok(())
    }

    /// 删除设备
    pub async fn delete(&self, device_id: &str) -> Result<(), ClientError> {
        validate_required(device_id, "设备 ID")?;

        self.api
            .mutate(Method::DELETE, &["devices", device_id], RequestBody::Empty)
            .await?;

        info!(device_id = %device_id, "设备已删除");
        Ok(())
    }
}
