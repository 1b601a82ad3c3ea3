//! 认证服务

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::errors::ClientError;
use crate::models::{LoginRequest, TokenPair, User};
use crate::services::{ApiClient, RequestBody};

/// 认证服务
pub struct AuthService {
    api: Arc<ApiClient>,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// 用户登录，成功后令牌写入会话
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<TokenPair, ClientError> {
        let request = LoginRequest {
            username: username.trim().to_string(),
            password: password.expose_secret().clone(),
        };
        request.validate()?;

        let tokens: TokenPair = self.api.post_json(&["auth", "login"], &request).await?;
        self.api.session().save(tokens.clone())?;

        info!(username = %request.username, "登录成功");
        Ok(tokens)
    }

    /// 获取当前用户资料并缓存到会话
    pub async fn profile(&self) -> Result<User, ClientError> {
        let user: User = self.api.get_json(&["auth", "profile"], &[]).await?;
        self.api.session().set_user(user.clone())?;
        Ok(user)
    }

    /// 通知后端登出（不清除本地会话，由调用方处理）
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.api
            .mutate(Method::POST, &["auth", "logout"], RequestBody::Empty)
            .await
            .map_err(|e| {
                warn!(error = %e, "登出请求失败");
                e
            })
    }
}
