//! 共享库
//!
//! 包含订单管道与积分账本两个服务共用的配置、错误处理、数据库连接、
//! 可观测性、定点金额运算、进程内 TTL 缓存与重试执行器。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod money;
pub mod observability;
pub mod retry;
