//! 会话上下文
//!
//! 保存访问令牌、刷新令牌、认证标志和用户资料，由调用方显式创建并以
//! `Arc<SessionStore>` 传给 API 客户端。`clear()` 会广播 [`AuthState::SignedOut`]，
//! 订阅方据此回到未登录入口。

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::storage::{MemoryBackend, PersistedSession, SessionBackend};
use super::token::{duplicate, is_present, mask_secret};
use crate::errors::ClientError;
use crate::models::{TokenPair, User};

/// 认证状态广播
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedIn,
    SignedOut,
}

#[derive(Default)]
struct Session {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    authenticated: bool,
    user: Option<User>,
}

impl Session {
    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            access_token: self.access_token.as_ref().map(|t| t.expose_secret().clone()),
            refresh_token: self.refresh_token.as_ref().map(|t| t.expose_secret().clone()),
            is_authenticated: self.authenticated,
            user: self.user.clone(),
        }
    }

    fn from_persisted(persisted: PersistedSession) -> Self {
        Self {
            access_token: persisted.access_token.map(SecretString::new),
            refresh_token: persisted.refresh_token.map(SecretString::new),
            authenticated: persisted.is_authenticated,
            user: persisted.user,
        }
    }

    fn looks_valid(&self) -> bool {
        self.authenticated && self.access_token.as_ref().map(is_present).unwrap_or(false)
    }
}

/// 会话存储
pub struct SessionStore {
    state: RwLock<Session>,
    backend: Box<dyn SessionBackend>,
    auth_tx: watch::Sender<AuthState>,
}

impl SessionStore {
    pub fn new(backend: impl SessionBackend + 'static) -> Self {
        let (auth_tx, _) = watch::channel(AuthState::SignedOut);
        Self {
            state: RwLock::new(Session::default()),
            backend: Box::new(backend),
            auth_tx,
        }
    }

    /// 仅驻留内存的会话
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// 启动时从后端恢复会话
    ///
    /// 返回是否存在看起来有效的会话（已认证且有访问令牌），不校验令牌内容。
    pub fn load(&self) -> Result<bool, ClientError> {
        let persisted = self.backend.load()?;
        let session = persisted.map(Session::from_persisted).unwrap_or_default();
        let valid = session.looks_valid();

        *self.state.write() = session;

        if valid {
            self.auth_tx.send_replace(AuthState::SignedIn);
            info!("已恢复本地会话");
        } else {
            debug!("本地没有可用会话");
        }

        Ok(valid)
    }

    /// 保存新令牌并标记为已认证
    pub fn save(&self, tokens: TokenPair) -> Result<(), ClientError> {
        let persisted = {
            let mut state = self.state.write();
            state.access_token = Some(SecretString::new(tokens.access_token));
            state.refresh_token = Some(SecretString::new(tokens.refresh_token));
            state.authenticated = true;
            state.to_persisted()
        };

        self.backend.save(&persisted)?;
        self.auth_tx.send_replace(AuthState::SignedIn);

        if let Some(token) = self.access_token() {
            debug!(access_token = %mask_secret(&token), "令牌已更新");
        }
        Ok(())
    }

    /// 缓存用户资料
    pub fn set_user(&self, user: User) -> Result<(), ClientError> {
        let persisted = {
            let mut state = self.state.write();
            state.user = Some(user);
            state.to_persisted()
        };
        self.backend.save(&persisted)
    }

    /// 清除全部会话数据并广播登出
    pub fn clear(&self) {
        *self.state.write() = Session::default();

        if let Err(e) = self.backend.clear() {
            warn!(error = %e, "清除持久化会话失败");
        }

        self.auth_tx.send_replace(AuthState::SignedOut);
        info!("会话已清除");
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.state.read().access_token.as_ref().map(duplicate)
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        self.state.read().refresh_token.as_ref().map(duplicate)
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().authenticated
    }

    /// 当前用户是否拥有编辑权限
    pub fn is_editor(&self) -> bool {
        self.state
            .read()
            .user
            .as_ref()
            .map(User::is_editor)
            .unwrap_or(false)
    }

    /// 订阅认证状态变化
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth_tx.subscribe()
    }
}
