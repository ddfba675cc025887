//! 应用状态定义

use std::sync::Arc;

use order_shared::config::PipelineSettings;

use crate::repository::{
    CatalogRepositoryTrait, MappingProfileRepositoryTrait, MemoryPipelineStore,
    OrderRepositoryTrait, SettlementRepositoryTrait, TierRepositoryTrait,
};
use crate::service::{
    EnrichmentService, IngestionService, MappingService, OrderService, SettlementService,
    TierService,
};

/// 服务依赖的仓储集合
#[derive(Clone)]
pub struct Repositories {
    pub mapping: Arc<dyn MappingProfileRepositoryTrait>,
    pub catalog: Arc<dyn CatalogRepositoryTrait>,
    pub tiers: Arc<dyn TierRepositoryTrait>,
    pub orders: Arc<dyn OrderRepositoryTrait>,
    pub settlements: Arc<dyn SettlementRepositoryTrait>,
}

impl Repositories {
    /// 全部仓储由同一个内存存储提供
    pub fn in_memory(store: Arc<MemoryPipelineStore>) -> Self {
        Self {
            mapping: store.clone(),
            catalog: store.clone(),
            tiers: store.clone(),
            orders: store.clone(),
            settlements: store,
        }
    }
}

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub mapping: Arc<MappingService>,
    pub tiers: Arc<TierService>,
    pub ingestion: Arc<IngestionService>,
    pub settlements: Arc<SettlementService>,
    pub orders: Arc<OrderService>,
}

impl AppState {
    /// 组装全部服务
    pub fn new(repos: Repositories, settings: &PipelineSettings) -> Self {
        let mapping = Arc::new(MappingService::new(
            repos.mapping,
            settings.profile_cache_ttl_seconds,
        ));
        let tiers = Arc::new(TierService::new(
            repos.tiers,
            repos.orders.clone(),
            settings.tier_cache_ttl_seconds,
            settings.tier_window_days,
        ));
        let enrichment = Arc::new(EnrichmentService::new(repos.catalog, settings.money_scale));
        let ingestion = Arc::new(IngestionService::new(
            mapping.clone(),
            tiers.clone(),
            enrichment,
            repos.orders.clone(),
            settings.money_scale,
        ));
        let settlements = Arc::new(SettlementService::new(
            repos.settlements,
            repos.orders.clone(),
            tiers.clone(),
            settings,
        ));
        let orders = Arc::new(OrderService::new(repos.orders));

        Self {
            mapping,
            tiers,
            ingestion,
            settlements,
            orders,
        }
    }
}
