//! 错误类型模块

mod client_error;
pub mod messages;

pub use client_error::ClientError;
pub use messages::{failure_message, success_message, Action};
