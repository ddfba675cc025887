//! 领域模型
//!
//! 所有模型都支持数据库（sqlx）和 JSON（serde）序列化

mod account;
mod enums;

pub use account::*;
pub use enums::*;
