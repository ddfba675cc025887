//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，PostgreSQL 与内存实现可互换，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CanonicalOrder, ManualTierOverride, MappingProfile, OptionAlias, OptionCatalogEntry,
    OrderVolume, SettlementRecord, TierCriterion,
};

/// 映射配置仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingProfileRepositoryTrait: Send + Sync {
    /// 全部启用的配置（不做唯一性校验，冲突由解析器判定）
    async fn list_active_profiles(&self) -> Result<Vec<MappingProfile>>;
}

/// 选项目录仓储接口（只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepositoryTrait: Send + Sync {
    /// 按选项名或选项编码批量查询，含非启用条目
    async fn find_entries(
        &self,
        option_names: &[String],
        option_codes: &[String],
    ) -> Result<Vec<OptionCatalogEntry>>;

    async fn list_aliases(&self, organization_id: &str) -> Result<Vec<OptionAlias>>;
}

/// 等级仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TierRepositoryTrait: Send + Sync {
    async fn list_criteria(&self) -> Result<Vec<TierCriterion>>;

    /// 整体替换等级标准
    async fn replace_criteria(&self, criteria: &[TierCriterion]) -> Result<()>;

    async fn get_manual_override(&self, organization_id: &str)
    -> Result<Option<ManualTierOverride>>;
    async fn set_manual_override(&self, manual: &ManualTierOverride) -> Result<()>;

    /// 返回是否存在被清除的手动等级
    async fn clear_manual_override(&self, organization_id: &str) -> Result<bool>;
}

/// 规范订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    async fn insert_orders(&self, orders: &[CanonicalOrder]) -> Result<u64>;

    async fn get_order(&self, id: Uuid) -> Result<Option<CanonicalOrder>>;

    /// 设置软删除标记，返回更新后的订单；订单不存在时返回 None
    async fn set_deleted<'a>(
        &self,
        id: Uuid,
        deleted: bool,
        actor_id: Option<&'a str>,
        at: DateTime<Utc>,
    ) -> Result<Option<CanonicalOrder>>;

    /// 物理删除已软删除的订单，返回是否删除了记录
    async fn purge_order(&self, id: Uuid) -> Result<bool>;

    /// 付款时间落在 [from, to) 内且未删除的订单
    async fn list_for_settlement(
        &self,
        organization_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalOrder>>;

    /// `since` 之后的有效订单量：计数含未匹配订单，销售额只计已匹配订单
    async fn order_volume(&self, organization_id: &str, since: DateTime<Utc>)
    -> Result<OrderVolume>;
}

/// 结算单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementRepositoryTrait: Send + Sync {
    async fn find_by_key(
        &self,
        organization_id: &str,
        settlement_date: NaiveDate,
    ) -> Result<Option<SettlementRecord>>;

    async fn get_settlement(&self, id: Uuid) -> Result<Option<SettlementRecord>>;

    /// 以草稿状态整体写入 (组织, 日期) 的结算单
    ///
    /// 已存结算单为确认状态时不写入并返回 false
    async fn upsert_draft(&self, record: &SettlementRecord) -> Result<bool>;

    /// 草稿 -> 确认，状态不符时返回 None
    async fn mark_confirmed(
        &self,
        id: Uuid,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>>;

    /// 确认 -> 草稿，记录操作人与原因并保留确认信息；状态不符时返回 None
    async fn mark_reopened(
        &self,
        id: Uuid,
        actor_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>>;

    /// 结算日落在 [from, to] 内的结算单，按组织、日期升序
    async fn list_range<'a>(
        &self,
        organization_id: Option<&'a str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SettlementRecord>>;
}
