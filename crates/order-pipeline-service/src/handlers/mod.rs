//! HTTP 处理器

pub mod health;
pub mod ingestion;
pub mod order;
pub mod settlement;
pub mod tier;
