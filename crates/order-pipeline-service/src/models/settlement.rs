//! 结算单

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SettlementStatus;

/// 结算单
///
/// 以 (organization_id, settlement_date) 为键，每次写入都是完整重算的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub id: Uuid,
    pub organization_id: String,
    pub settlement_date: NaiveDate,
    /// 计入金额的订单数
    pub order_count: i64,
    pub cancelled_count: i64,
    pub refunded_count: i64,
    /// 未匹配目录的订单数（不计金额）
    pub unresolved_count: i64,
    pub total_quantity: i64,
    pub gross_amount: Decimal,
    pub discount_total: Decimal,
    pub net_amount: Decimal,
    /// 采用的折扣率，确认后冻结
    pub discount_rate: Decimal,
    pub tier_name: Option<String>,
    pub status: SettlementStatus,
    /// 参与计算的订单摘要，用于比对确认后的重算结果
    pub source_digest: String,
    /// 最近一次确认的操作人与时间，重新打开后保留
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub reopened_by: Option<String>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub reopen_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementRecord {
    pub fn is_confirmed(&self) -> bool {
        self.status == SettlementStatus::Confirmed
    }
}

/// 区间汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    pub record_count: usize,
    pub confirmed_count: usize,
    pub order_count: i64,
    pub unresolved_count: i64,
    pub gross_amount: Decimal,
    pub discount_total: Decimal,
    pub net_amount: Decimal,
}

/// 月度汇总行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySettlement {
    pub organization_id: String,
    /// YYYY-MM
    pub month: String,
    pub day_count: usize,
    pub confirmed_days: usize,
    pub order_count: i64,
    pub gross_amount: Decimal,
    pub discount_total: Decimal,
    pub net_amount: Decimal,
}
