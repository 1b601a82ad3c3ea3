//! 数据模型模块

mod alert;
mod common;
mod device;
mod event;
mod sensor;
mod threshold;
mod user;

pub use alert::*;
pub use common::*;
pub use device::*;
pub use event::*;
pub use sensor::*;
pub use threshold::*;
pub use user::*;
