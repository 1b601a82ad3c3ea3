//! 会话持久化后端

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::models::User;

/// 持久化的会话内容
///
/// 四项数据总是一起写入、一起清除。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
}

/// 会话存储后端
pub trait SessionBackend: Send + Sync {
    /// 读取会话，不存在时返回 None
    fn load(&self) -> Result<Option<PersistedSession>, ClientError>;

    /// 覆盖写入会话
    fn save(&self, session: &PersistedSession) -> Result<(), ClientError>;

    /// 删除会话
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON 文件后端
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<Option<PersistedSession>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClientError::Session(format!("读取会话文件失败: {}", e))),
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // 损坏的会话文件视为未登录
                warn!(path = %self.path.display(), error = %e, "会话文件格式无效，已忽略");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ClientError::Session(format!("创建会话目录失败: {}", e)))?;
            }
        }

        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| ClientError::Session(format!("序列化会话失败: {}", e)))?;

        // 先写临时文件再替换，避免写入中断留下半个文件
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| ClientError::Session(format!("写入会话文件失败: {}", e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::Session(format!("写入会话文件失败: {}", e)))?;

        debug!(path = %self.path.display(), "会话已保存");
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Session(format!("删除会话文件失败: {}", e))),
        }
    }
}

/// 内存后端（测试与临时运行）
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置会话内容
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }

    /// 当前保存的内容
    pub fn snapshot(&self) -> Option<PersistedSession> {
        self.slot.lock().clone()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<PersistedSession>, ClientError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), ClientError> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot.lock() = None;
        Ok(())
    }
}
