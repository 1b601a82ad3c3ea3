//! 工具函数模块

mod number;
mod time;
mod validators;

pub use number::*;
pub use time::*;
pub use validators::*;
