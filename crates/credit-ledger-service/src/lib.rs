//! 积分账本服务
//!
//! 为付费工具的计量计费提供只追加的积分流水与余额。
//!
//! ## 核心功能
//!
//! - **发放**：运营为组织充值积分
//! - **消耗**：计量方按用量扣减，余额不足时拒绝
//! - **撤销**：以反向流水冲正历史交易，原流水只标记不修改
//! - **每日补充**：每个自然日最多一次将余额补足到上限
//! - **审计**：余额可由流水完整重建，支持任意时点余额回溯
//!
//! 所有变更操作都要求调用方提供幂等键，重复请求返回首次结果。
//!
//! ## 模块结构
//!
//! - `models`: 账户、流水、回执等领域模型
//! - `command`: 账本指令、指纹与纯函数记账规则
//! - `error`: 错误类型定义
//! - `repository`: 账本存储（PostgreSQL / 内存）
//! - `service`: 业务服务层
//! - `handlers` / `routes` / `state` / `dto`: HTTP 接口

pub mod command;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use command::LedgerCommand;
pub use error::{LedgerError, Result};
pub use models::*;
pub use repository::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
pub use service::CreditLedgerService;
