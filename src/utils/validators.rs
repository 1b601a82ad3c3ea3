//! 数据验证工具

use crate::errors::ClientError;
use std::cmp::Ordering;

/// 验证必填字段
pub fn validate_required(value: &str, field_name: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("请填写{}", field_name)));
    }
    Ok(())
}

/// 验证阈值范围（最小值必须小于最大值）
pub fn validate_threshold_range(min_value: f64, max_value: f64) -> Result<(), ClientError> {
    if min_value.partial_cmp(&max_value) != Some(Ordering::Less) {
        return Err(ClientError::Validation("最小值必须小于最大值".to_string()));
    }
    Ok(())
}

/// 验证预测时间窗口
pub fn validate_hours_window(hours_window: i64) -> Result<(), ClientError> {
    if hours_window <= 0 {
        return Err(ClientError::Validation("时间窗口必须大于 0 小时".to_string()));
    }
    Ok(())
}
