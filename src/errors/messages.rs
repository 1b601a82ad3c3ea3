//! 面向用户的操作失败提示
//!
//! 不同操作对同一状态码的解释不同（例如 404 对登录表示用户名或密码错误），
//! 这里集中维护映射，视图层只需传入操作类型和错误。

use super::ClientError;

/// 用户可触发的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    AddDevice,
    UpdateDevice,
    DeleteDevice,
    AddThreshold,
    UpdateThreshold,
    DeleteThreshold,
    AddForecastConfig,
    UpdateForecastConfig,
    DeleteForecastConfig,
}

impl Action {
    /// 操作对象名称
    fn subject(&self) -> &'static str {
        match self {
            Action::Login => "登录",
            Action::AddDevice | Action::UpdateDevice | Action::DeleteDevice => "设备",
            Action::AddThreshold | Action::UpdateThreshold | Action::DeleteThreshold => "阈值",
            Action::AddForecastConfig
            | Action::UpdateForecastConfig
            | Action::DeleteForecastConfig => "预测配置",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Login => "登录",
            Action::AddDevice | Action::AddThreshold | Action::AddForecastConfig => "添加",
            Action::UpdateDevice | Action::UpdateThreshold | Action::UpdateForecastConfig => "更新",
            Action::DeleteDevice | Action::DeleteThreshold | Action::DeleteForecastConfig => "删除",
        }
    }

    fn is_create(&self) -> bool {
        matches!(
            self,
            Action::AddDevice | Action::AddThreshold | Action::AddForecastConfig
        )
    }
}

/// 操作成功提示
pub fn success_message(action: Action) -> String {
    match action {
        Action::Login => "登录成功".to_string(),
        _ => format!("{}{}成功", action.subject(), action.verb()),
    }
}

/// 将错误转换为面向用户的提示
pub fn failure_message(action: Action, error: &ClientError) -> String {
    if let ClientError::Validation(msg) = error {
        return msg.clone();
    }

    if action == Action::Login {
        if let Some(msg) = error.server_message() {
            return msg.to_string();
        }
        return match error {
            ClientError::NotFound(_) => "用户名或密码错误".to_string(),
            _ => "登录失败，请重试".to_string(),
        };
    }

    match error.status() {
        Some(409) if action.is_create() => {
            if action == Action::AddDevice {
                "设备 ID 已存在".to_string()
            } else {
                format!("该传感器类型的{}已存在", action.subject())
            }
        }
        Some(403) => match action {
            Action::AddDevice | Action::UpdateDevice | Action::DeleteDevice => {
                format!("您没有{}设备的权限", action.verb())
            }
            _ => "您没有执行此操作的权限".to_string(),
        },
        Some(404) if !action.is_create() => format!("{}不存在", action.subject()),
        Some(400) if matches!(action, Action::AddThreshold | Action::AddForecastConfig) => {
            format!("{}数值无效", action.subject())
        }
        _ => format!("{}{}失败", action.subject(), action.verb()),
    }
}
