//! 订单流水线服务
//!
//! 把各平台格式不一的订单导出表转换为统一的规范订单，匹配商品目录、
//! 按组织等级计算折扣，并按 (组织, 结算日) 生成结算单。
//!
//! ## 处理流程
//!
//! 原始行 -> 映射解析 -> 规范化 -> 目录匹配（含等级折扣）-> 规范订单 -> 结算重算
//!
//! ## 模块结构
//!
//! - `models`: 映射配置、规范订单、目录、等级、结算单等领域模型
//! - `engine`: 纯计算引擎（解析、规范化、等级、匹配、结算）
//! - `error`: 错误类型定义
//! - `repository`: 数据访问层（PostgreSQL / 内存）
//! - `service`: 业务服务层
//! - `handlers` / `routes` / `state` / `dto`: HTTP 接口

pub mod dto;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{PipelineError, Result};
pub use service::{
    EnrichmentService, IngestionService, MappingService, OrderService, SettlementService,
    TierService,
};
