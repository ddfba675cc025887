//! HTTP 处理器

pub mod credit;
pub mod health;
