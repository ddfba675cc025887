//! 账本存储层
//!
//! ## 设计原则
//!
//! - 同一组织的写操作必须串行：PostgreSQL 使用账户行 `FOR UPDATE`，
//!   内存实现使用按组织划分的互斥锁
//! - 幂等键全局唯一，重复请求在临界区内被识别并重放
//! - 记账规则来自 `command::plan`，存储只负责串行化与持久化
//! - 定义 trait 接口以支持 mock 测试

mod memory_store;
mod pg_store;
mod traits;

pub use memory_store::MemoryLedgerStore;
pub use pg_store::PgLedgerStore;
pub use traits::*;
