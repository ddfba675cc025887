//! 等级服务
//!
//! 组织等级由滚动窗口内的订单量实时评估，等级标准经 TTL 缓存读取。
//! 标准修改只影响之后的计算，已确认结算单的折扣率不变。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use order_shared::cache::TtlCache;

use crate::engine::TierTable;
use crate::error::{PipelineError, Result};
use crate::models::{ManualTierOverride, TierAssignment, TierCriterion};
use crate::repository::{OrderRepositoryTrait, TierRepositoryTrait};

const CRITERIA: &str = "criteria";

/// 等级服务
pub struct TierService {
    repo: Arc<dyn TierRepositoryTrait>,
    orders: Arc<dyn OrderRepositoryTrait>,
    cache: TtlCache<&'static str, TierTable>,
    window_days: i64,
}

impl TierService {
    pub fn new(
        repo: Arc<dyn TierRepositoryTrait>,
        orders: Arc<dyn OrderRepositoryTrait>,
        ttl_seconds: u64,
        window_days: i64,
    ) -> Self {
        Self {
            repo,
            orders,
            cache: TtlCache::with_ttl_seconds("tier_criteria", ttl_seconds),
            window_days,
        }
    }

    /// 当前等级表
    pub async fn table(&self) -> Result<TierTable> {
        let repo = self.repo.clone();
        self.cache
            .get_or_try_load(&CRITERIA, || async move {
                repo.list_criteria().await.map(TierTable::new)
            })
            .await
    }

    /// 评估组织当前等级
    #[instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn get_tier(&self, organization_id: &str, now: DateTime<Utc>) -> Result<TierAssignment> {
        let table = self.table().await?;
        let since = now - Duration::days(self.window_days);
        let volume = self.orders.order_volume(organization_id, since).await?;
        let manual = self.repo.get_manual_override(organization_id).await?;

        Ok(table.assign(organization_id, volume, manual.as_ref()))
    }

    /// 等级对应的折扣率，未知等级与无等级都回落到基础等级
    pub async fn discount_rate(&self, tier_name: Option<&str>) -> Result<Decimal> {
        Ok(self.table().await?.discount_rate(tier_name))
    }

    pub async fn list_criteria(&self) -> Result<Vec<TierCriterion>> {
        Ok(self.table().await?.criteria().to_vec())
    }

    /// 替换等级标准
    #[instrument(skip_all, fields(actor_id = %actor_id, count = criteria.len()))]
    pub async fn replace_criteria(&self, criteria: Vec<TierCriterion>, actor_id: &str) -> Result<()> {
        TierTable::validate(&criteria)?;
        self.repo.replace_criteria(&criteria).await?;
        self.cache.invalidate_all().await;

        info!(
            actor_id,
            tiers = ?criteria.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "等级标准已更新，仅对之后的计算生效"
        );
        Ok(())
    }

    /// 手动指定组织等级
    #[instrument(skip_all, fields(organization_id = %organization_id, tier = %tier_name, actor_id = %actor_id))]
    pub async fn set_manual_tier(
        &self,
        organization_id: &str,
        tier_name: &str,
        actor_id: &str,
    ) -> Result<ManualTierOverride> {
        let table = self.table().await?;
        if table.find(tier_name).is_none() {
            return Err(PipelineError::TierNotFound(tier_name.to_string()));
        }

        let manual = ManualTierOverride {
            organization_id: organization_id.to_string(),
            tier_name: tier_name.to_string(),
            actor_id: actor_id.to_string(),
            updated_at: Utc::now(),
        };
        self.repo.set_manual_override(&manual).await?;

        info!(organization_id, tier = tier_name, actor_id, "已手动指定组织等级");
        Ok(manual)
    }

    /// 清除手动等级，恢复按交易量计算
    #[instrument(skip_all, fields(organization_id = %organization_id, actor_id = %actor_id))]
    pub async fn clear_manual_tier(&self, organization_id: &str, actor_id: &str) -> Result<bool> {
        let cleared = self.repo.clear_manual_override(organization_id).await?;
        if cleared {
            info!(organization_id, actor_id, "已清除手动等级");
        }
        Ok(cleared)
    }
}
