//! 纯计算引擎
//!
//! 解析、规范化、等级评估、目录匹配与结算重算都不做 I/O，
//! 数据由服务层从仓储加载后传入。

pub mod enrichment;
pub mod normalizer;
pub mod resolver;
pub mod settlement;
pub mod tier;
pub mod transform;

pub use enrichment::{
    AliasTable, CatalogIndex, EnrichmentResult, EnrichmentWarning, enrich, settlement_amount,
};
pub use normalizer::{NormalizationOutcome, NormalizedRow, normalize};
pub use resolver::{ResolvedField, ResolvedMapping, detect_marketplace, resolve};
pub use settlement::{SettlementComputation, group_by_month, settlement_window, summarize};
pub use tier::TierTable;
pub use transform::FieldTransform;
