//! 统一错误类型定义

use serde::Deserialize;

/// 客户端错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    // 认证错误 (401)
    #[error("认证失败: {0}")]
    Unauthorized(String),

    // 权限错误 (403)
    #[error("权限不足: {0}")]
    Forbidden(String),

    // 资源不存在 (404)
    #[error("资源不存在: {0}")]
    NotFound(String),

    // 请求体无效 (400)
    #[error("请求参数无效: {0}")]
    BadRequest(String),

    // 冲突错误 (409)
    #[error("资源冲突: {0}")]
    Conflict(String),

    // 其他非 2xx 响应
    #[error("服务端返回错误 {status}: {message}")]
    Http { status: u16, message: String },

    // 客户端校验失败（未发出请求）
    #[error("{0}")]
    Validation(String),

    // 网络错误（连接失败、读取中断等）
    #[error("网络错误: {0}")]
    Network(String),

    // 响应解析失败
    #[error("响应解析失败: {0}")]
    Decode(String),

    // 会话存储错误
    #[error("会话存储错误: {0}")]
    Session(String),

    // 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    // 实时数据流错误
    #[error("数据流错误: {0}")]
    Stream(String),
}

/// 后端错误响应结构
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ClientError {
    /// 根据 HTTP 状态码和响应体构造错误
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("HTTP {}", status));

        match status {
            400 => ClientError::BadRequest(message),
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            _ => ClientError::Http { status, message },
        }
    }

    /// 对应的 HTTP 状态码（非 HTTP 错误返回 None）
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BadRequest(_) => Some(400),
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Forbidden(_) => Some(403),
            ClientError::NotFound(_) => Some(404),
            ClientError::Conflict(_) => Some(409),
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 后端返回的错误消息（响应体中没有 message 字段时返回 None）
    pub fn server_message(&self) -> Option<&str> {
        let message = match self {
            ClientError::BadRequest(msg)
            | ClientError::Unauthorized(msg)
            | ClientError::Forbidden(msg)
            | ClientError::NotFound(msg)
            | ClientError::Conflict(msg)
            | ClientError::Http { message: msg, .. } => msg.as_str(),
            _ => return None,
        };
        let status = self.status()?;
        (message != format!("HTTP {}", status)).then_some(message)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // 取第一条带消息的字段错误作为提示
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "请求参数无效".to_string());
        ClientError::Validation(message)
    }
}
