//! 用户与认证数据模型

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// 用户角色枚举
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Editor,
    #[default]
    Viewer,
    /// 后端返回的未知角色按只读处理
    #[serde(other)]
    Unknown,
}

impl UserRole {
    /// 是否拥有编辑权限（设备、阈值、预测配置的增删改）
    pub fn is_editor(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Editor)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "Admin"),
            UserRole::Editor => write!(f, "Editor"),
            UserRole::Viewer => write!(f, "Viewer"),
            UserRole::Unknown => write!(f, "Unknown"),
        }
    }
}

/// 用户资料（/auth/profile）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
}

impl User {
    pub fn is_editor(&self) -> bool {
        self.role.is_editor()
    }
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100, message = "请输入用户名"))]
    pub username: String,

    #[validate(length(min = 1, max = 128, message = "请输入密码"))]
    pub password: String,
}

/// 令牌对（登录与刷新响应）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// 刷新令牌请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub access_token: String,
}
