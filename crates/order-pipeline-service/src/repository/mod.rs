//! 流水线仓储层
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 目录只读；订单只做软删除，物理删除需显式清除
//! - 结算单按 (组织, 日期) 整条覆盖，确认后由条件更新拒绝覆盖
//! - 定义 trait 接口以支持 mock 测试

mod catalog_repo;
mod mapping_repo;
mod memory_store;
mod order_repo;
mod settlement_repo;
mod tier_repo;
mod traits;

pub use catalog_repo::CatalogRepository;
pub use mapping_repo::MappingProfileRepository;
pub use memory_store::MemoryPipelineStore;
pub use order_repo::OrderRepository;
pub use settlement_repo::SettlementRepository;
pub use tier_repo::TierRepository;
pub use traits::*;
