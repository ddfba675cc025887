//! 等级与折扣

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderVolume, TierSource};

/// 等级标准
///
/// 订单数与销售额两个门槛必须同时满足，`rank` 越大等级越高
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TierCriterion {
    pub name: String,
    pub rank: i32,
    pub min_order_count: i64,
    pub min_total_sales: Decimal,
    /// 折扣率，取值 [0, 1)
    pub discount_rate: Decimal,
}

impl TierCriterion {
    pub fn is_satisfied_by(&self, volume: &OrderVolume) -> bool {
        volume.order_count >= self.min_order_count && volume.total_sales >= self.min_total_sales
    }
}

/// 手动指定的等级
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ManualTierOverride {
    pub organization_id: String,
    pub tier_name: String,
    pub actor_id: String,
    pub updated_at: DateTime<Utc>,
}

/// 组织当前等级
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAssignment {
    pub organization_id: String,
    /// 没有任何等级标准时为空
    pub tier_name: Option<String>,
    pub discount_rate: Decimal,
    pub source: TierSource,
    pub volume: OrderVolume,
}
