//! 安全模块：会话保管与令牌处理

mod session;
mod storage;
mod token;

pub use session::*;
pub use storage::*;
pub use token::{mask_secret, mask_token};
pub(crate) use token::is_present;
