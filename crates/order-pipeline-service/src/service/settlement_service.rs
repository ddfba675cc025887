//! 结算服务
//!
//! 结算单按 (组织, 结算日) 从当前有效订单完整重算后整体覆盖：
//! - 内容未变化时不写入，结算单保持逐字节一致
//! - 确认后禁止自动重算；重算结果与已存摘要不一致视为一致性错误，需人工处理
//! - 重新打开确认单必须由授权操作人显式执行并记录原因

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use order_shared::config::PipelineSettings;
use order_shared::observability::metrics;

use super::TierService;
use crate::engine::settlement;
use crate::error::{PipelineError, Result};
use crate::models::{MonthlySettlement, SettlementRecord, SettlementStatus, SettlementSummary};
use crate::repository::{OrderRepositoryTrait, SettlementRepositoryTrait};

/// 重算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementUpsert {
    pub record: SettlementRecord,
    pub outcome: UpsertOutcome,
}

/// 结算服务
pub struct SettlementService {
    settlements: Arc<dyn SettlementRepositoryTrait>,
    orders: Arc<dyn OrderRepositoryTrait>,
    tiers: Arc<TierService>,
    money_scale: u32,
    utc_offset_minutes: i32,
}

impl SettlementService {
    pub fn new(
        settlements: Arc<dyn SettlementRepositoryTrait>,
        orders: Arc<dyn OrderRepositoryTrait>,
        tiers: Arc<TierService>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            settlements,
            orders,
            tiers,
            money_scale: settings.money_scale,
            utc_offset_minutes: settings.settlement_utc_offset_minutes,
        }
    }

    /// 重算 (组织, 结算日) 的结算单
    ///
    /// `confirm_as` 有值时，重算完成后立即以该操作人确认
    #[instrument(skip_all, fields(organization_id = %organization_id, date = %date))]
    pub async fn upsert_settlement(
        &self,
        organization_id: &str,
        date: NaiveDate,
        confirm_as: Option<&str>,
    ) -> Result<SettlementUpsert> {
        let result = self.materialize(organization_id, date).await;
        let outcome_label = match &result {
            Ok(upsert) => upsert.outcome.as_str(),
            Err(PipelineError::ImmutableAfterConfirm { .. }) => "immutable",
            Err(PipelineError::ConsistencyError { .. }) => "inconsistent",
            Err(_) => "error",
        };
        metrics::record_settlement_upsert(outcome_label);

        let mut upsert = result?;
        if let Some(actor_id) = confirm_as {
            upsert.record = self.confirm(upsert.record.id, actor_id).await?;
        }
        Ok(upsert)
    }

    async fn materialize(&self, organization_id: &str, date: NaiveDate) -> Result<SettlementUpsert> {
        let (from, to) = settlement::settlement_window(date, self.utc_offset_minutes)?;
        let orders = self
            .orders
            .list_for_settlement(organization_id, from, to)
            .await?;
        let existing = self.settlements.find_by_key(organization_id, date).await?;

        // 已确认：按冻结的折扣率重算，仅用于一致性校验
        if let Some(record) = existing.as_ref().filter(|r| r.is_confirmed()) {
            let recomputed = settlement::compute(&orders, record.discount_rate, self.money_scale);
            if recomputed.matches(record) {
                return Err(PipelineError::ImmutableAfterConfirm {
                    organization_id: organization_id.to_string(),
                    date,
                });
            }
            error!(
                organization_id,
                date = %date,
                settlement_id = %record.id,
                stored_digest = %record.source_digest,
                recomputed_digest = %recomputed.source_digest,
                stored_net = %record.net_amount,
                recomputed_net = %recomputed.net_amount,
                "已确认结算单与重算结果不一致，需人工核查"
            );
            return Err(PipelineError::ConsistencyError {
                organization_id: organization_id.to_string(),
                date,
                stored_digest: record.source_digest.clone(),
                recomputed_digest: recomputed.source_digest,
            });
        }

        let tier = self.tiers.get_tier(organization_id, Utc::now()).await?;
        let computation = settlement::compute(&orders, tier.discount_rate, self.money_scale);

        if let Some(record) = existing.as_ref()
            && computation.matches(record)
            && record.discount_rate == tier.discount_rate
            && record.tier_name == tier.tier_name
        {
            return Ok(SettlementUpsert {
                record: record.clone(),
                outcome: UpsertOutcome::Unchanged,
            });
        }

        let now = Utc::now();
        let (mut record, outcome) = match existing {
            Some(record) => (record, UpsertOutcome::Updated),
            None => (
                SettlementRecord {
                    id: Uuid::new_v4(),
                    organization_id: organization_id.to_string(),
                    settlement_date: date,
                    order_count: 0,
                    cancelled_count: 0,
                    refunded_count: 0,
                    unresolved_count: 0,
                    total_quantity: 0,
                    gross_amount: Decimal::ZERO,
                    discount_total: Decimal::ZERO,
                    net_amount: Decimal::ZERO,
                    discount_rate: Decimal::ZERO,
                    tier_name: None,
                    status: SettlementStatus::Draft,
                    source_digest: String::new(),
                    confirmed_by: None,
                    confirmed_at: None,
                    reopened_by: None,
                    reopened_at: None,
                    reopen_reason: None,
                    created_at: now,
                    updated_at: now,
                },
                UpsertOutcome::Created,
            ),
        };
        computation.apply_to(&mut record, tier.discount_rate, tier.tier_name);
        record.updated_at = now;

        if !self.settlements.upsert_draft(&record).await? {
            // 读取之后被并发确认
            return Err(PipelineError::ImmutableAfterConfirm {
                organization_id: organization_id.to_string(),
                date,
            });
        }

        let stored = self
            .settlements
            .find_by_key(organization_id, date)
            .await?
            .unwrap_or(record);

        info!(
            settlement_id = %stored.id,
            outcome = outcome.as_str(),
            order_count = stored.order_count,
            unresolved_count = stored.unresolved_count,
            net_amount = %stored.net_amount,
            discount_rate = %stored.discount_rate,
            "结算单已重算"
        );

        Ok(SettlementUpsert {
            record: stored,
            outcome,
        })
    }

    /// 确认结算单，冻结当前折扣率
    #[instrument(skip_all, fields(settlement_id = %settlement_id, actor_id = %actor_id))]
    pub async fn confirm(&self, settlement_id: Uuid, actor_id: &str) -> Result<SettlementRecord> {
        if actor_id.trim().is_empty() {
            return Err(PipelineError::Validation("确认操作人不能为空".to_string()));
        }

        let now = Utc::now();
        match self.settlements.mark_confirmed(settlement_id, actor_id, now).await? {
            Some(record) => {
                info!(
                    organization_id = %record.organization_id,
                    date = %record.settlement_date,
                    net_amount = %record.net_amount,
                    discount_rate = %record.discount_rate,
                    "结算单已确认"
                );
                Ok(record)
            }
            None => match self.settlements.get_settlement(settlement_id).await? {
                Some(_) => Err(PipelineError::AlreadyConfirmed(settlement_id)),
                None => Err(PipelineError::SettlementNotFound(settlement_id)),
            },
        }
    }

    /// 重新打开已确认的结算单
    #[instrument(skip_all, fields(settlement_id = %settlement_id, actor_id = %actor_id))]
    pub async fn reopen(
        &self,
        settlement_id: Uuid,
        actor_id: &str,
        reason: &str,
    ) -> Result<SettlementRecord> {
        if actor_id.trim().is_empty() || reason.trim().is_empty() {
            return Err(PipelineError::Validation(
                "重新打开结算单必须提供操作人和原因".to_string(),
            ));
        }

        let previous = self
            .settlements
            .get_settlement(settlement_id)
            .await?
            .ok_or(PipelineError::SettlementNotFound(settlement_id))?;

        let record = self
            .settlements
            .mark_reopened(settlement_id, actor_id, reason, Utc::now())
            .await?
            .ok_or(PipelineError::NotConfirmed(settlement_id))?;

        warn!(
            organization_id = %record.organization_id,
            date = %record.settlement_date,
            actor_id,
            reason,
            previous_confirmed_by = ?previous.confirmed_by,
            frozen_discount_rate = %previous.discount_rate,
            "已确认结算单被重新打开"
        );
        Ok(record)
    }

    pub async fn get_settlement(&self, settlement_id: Uuid) -> Result<SettlementRecord> {
        self.settlements
            .get_settlement(settlement_id)
            .await?
            .ok_or(PipelineError::SettlementNotFound(settlement_id))
    }

    /// 按日期区间查询结算单
    pub async fn get_settlements(
        &self,
        organization_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SettlementRecord>> {
        if from > to {
            return Err(PipelineError::Validation(format!(
                "开始日期 {} 晚于结束日期 {}",
                from, to
            )));
        }
        self.settlements.list_range(organization_id, from, to).await
    }

    pub fn summarize(&self, records: &[SettlementRecord]) -> SettlementSummary {
        settlement::summarize(records)
    }

    pub fn group_by_month(&self, records: &[SettlementRecord]) -> Vec<MonthlySettlement> {
        settlement::group_by_month(records)
    }
}
