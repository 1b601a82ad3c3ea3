//! 令牌工具
//!
//! 后端签发的令牌是不透明字符串，客户端不解析其内容，只负责保管与遮蔽。

use secrecy::{ExposeSecret, SecretString};

/// 遮蔽令牌（用于日志）
pub fn mask_token(token: &str) -> String {
    if token.chars().count() > 12 {
        let visible: String = token.chars().take(8).collect();
        format!("{}...", visible)
    } else {
        "***".to_string()
    }
}

/// 遮蔽受保护的令牌
pub fn mask_secret(token: &SecretString) -> String {
    mask_token(token.expose_secret())
}

/// 复制一份受保护的令牌
pub(crate) fn duplicate(token: &SecretString) -> SecretString {
    SecretString::new(token.expose_secret().clone())
}

/// 令牌是否非空
pub(crate) fn is_present(token: &SecretString) -> bool {
    !token.expose_secret().trim().is_empty()
}
