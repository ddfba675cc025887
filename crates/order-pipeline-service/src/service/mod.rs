//! 业务服务层
//!
//! 服务负责从仓储加载数据、调用纯计算引擎并写回结果，
//! 同时承担日志与指标记录。

mod enrichment_service;
mod ingestion_service;
mod mapping_service;
mod order_service;
mod settlement_service;
mod tier_service;

pub use enrichment_service::EnrichmentService;
pub use ingestion_service::{IngestedRow, IngestionReport, IngestionService};
pub use mapping_service::MappingService;
pub use order_service::OrderService;
pub use settlement_service::{SettlementService, SettlementUpsert, UpsertOutcome};
pub use tier_service::TierService;
