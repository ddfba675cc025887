//! 结算计算
//!
//! 根据某组织某结算日的订单完整重算结算数据。输入订单按 ID 排序后计算，
//! 同一订单集合与折扣率总是得到相同的金额与摘要。

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

use order_shared::money;

use super::enrichment::settlement_amount;
use crate::error::{PipelineError, Result};
use crate::models::{
    CanonicalOrder, MonthlySettlement, SettlementRecord, SettlementStatus, SettlementSummary,
    ShippingStatus,
};

/// 一次重算的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementComputation {
    pub order_count: i64,
    pub cancelled_count: i64,
    pub refunded_count: i64,
    pub unresolved_count: i64,
    pub total_quantity: i64,
    pub gross_amount: Decimal,
    pub discount_total: Decimal,
    pub net_amount: Decimal,
    pub source_digest: String,
}

/// 结算日在 UTC 下的起止区间 [start, end)
pub fn settlement_window(
    date: NaiveDate,
    utc_offset_minutes: i32,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        PipelineError::Validation(format!("无效的结算时区偏移: {} 分钟", utc_offset_minutes))
    })?;
    let start = offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| PipelineError::Internal(format!("无法确定结算日起点: {}", date)))?
        .with_timezone(&Utc);
    Ok((start, start + Duration::days(1)))
}

/// 完整重算
///
/// 取消、退款订单只计数不计金额；未匹配目录的订单计入 `unresolved_count`，不计金额
pub fn compute(orders: &[CanonicalOrder], discount_rate: Decimal, scale: u32) -> SettlementComputation {
    let mut sorted: Vec<&CanonicalOrder> = orders.iter().filter(|o| !o.is_deleted).collect();
    sorted.sort_by_key(|o| o.id);

    let mut result = SettlementComputation::default();
    let mut hasher = Sha256::new();
    hasher.update(discount_rate.normalize().to_string().as_bytes());

    for order in sorted {
        let mut line_net = Decimal::ZERO;

        match order.shipping_status {
            ShippingStatus::Cancelled => result.cancelled_count += 1,
            ShippingStatus::Refunded => result.refunded_count += 1,
            _ => match order.supply_price.filter(|_| order.is_resolved()) {
                None => result.unresolved_count += 1,
                Some(price) => {
                    let gross = money::round_half_up(price * Decimal::from(order.quantity), scale);
                    line_net = settlement_amount(price, order.quantity, discount_rate, scale);
                    result.order_count += 1;
                    result.total_quantity += i64::from(order.quantity);
                    result.gross_amount += gross;
                    result.net_amount += line_net;
                }
            },
        }

        hasher.update(
            format!(
                "|{}:{:?}:{}:{}",
                order.id,
                order.shipping_status,
                order.quantity,
                line_net.normalize()
            )
            .as_bytes(),
        );
    }

    result.discount_total = result.gross_amount - result.net_amount;
    result.source_digest = format!("{:x}", hasher.finalize());
    result
}

impl SettlementComputation {
    /// 把重算结果写入结算单，保留 ID、创建时间与确认信息
    pub fn apply_to(
        &self,
        record: &mut SettlementRecord,
        discount_rate: Decimal,
        tier_name: Option<String>,
    ) {
        record.order_count = self.order_count;
        record.cancelled_count = self.cancelled_count;
        record.refunded_count = self.refunded_count;
        record.unresolved_count = self.unresolved_count;
        record.total_quantity = self.total_quantity;
        record.gross_amount = self.gross_amount;
        record.discount_total = self.discount_total;
        record.net_amount = self.net_amount;
        record.discount_rate = discount_rate;
        record.tier_name = tier_name;
        record.source_digest = self.source_digest.clone();
    }

    /// 与已存结算单的计算字段是否一致
    pub fn matches(&self, record: &SettlementRecord) -> bool {
        self.source_digest == record.source_digest
            && self.order_count == record.order_count
            && self.cancelled_count == record.cancelled_count
            && self.refunded_count == record.refunded_count
            && self.unresolved_count == record.unresolved_count
            && self.total_quantity == record.total_quantity
            && self.gross_amount == record.gross_amount
            && self.net_amount == record.net_amount
    }
}

/// 区间汇总
pub fn summarize(records: &[SettlementRecord]) -> SettlementSummary {
    records
        .iter()
        .fold(SettlementSummary::default(), |mut acc, r| {
            acc.record_count += 1;
            if r.status == SettlementStatus::Confirmed {
                acc.confirmed_count += 1;
            }
            acc.order_count += r.order_count;
            acc.unresolved_count += r.unresolved_count;
            acc.gross_amount += r.gross_amount;
            acc.discount_total += r.discount_total;
            acc.net_amount += r.net_amount;
            acc
        })
}

/// 按 (组织, 月份) 汇总日结算单，结果按组织、月份升序
pub fn group_by_month(records: &[SettlementRecord]) -> Vec<MonthlySettlement> {
    let mut months: BTreeMap<(String, String), MonthlySettlement> = BTreeMap::new();

    for r in records {
        let month = r.settlement_date.format("%Y-%m").to_string();
        let row = months
            .entry((r.organization_id.clone(), month.clone()))
            .or_insert_with(|| MonthlySettlement {
                organization_id: r.organization_id.clone(),
                month,
                day_count: 0,
                confirmed_days: 0,
                order_count: 0,
                gross_amount: Decimal::ZERO,
                discount_total: Decimal::ZERO,
                net_amount: Decimal::ZERO,
            });
        row.day_count += 1;
        if r.is_confirmed() {
            row.confirmed_days += 1;
        }
        row.order_count += r.order_count;
        row.gross_amount += r.gross_amount;
        row.discount_total += r.discount_total;
        row.net_amount += r.net_amount;
    }

    months.into_values().collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::models::EnrichmentStatus;

    fn order(price: Option<Decimal>, quantity: i32, status: ShippingStatus) -> CanonicalOrder {
        let now = Utc::now();
        CanonicalOrder {
            id: Uuid::new_v4(),
            organization_id: "org-1".to_string(),
            marketplace: "coupang".to_string(),
            batch_id: Uuid::nil(),
            seller_order_number: None,
            option_name: "사과 1kg".to_string(),
            option_code: None,
            quantity,
            recipient_name: None,
            recipient_phone: None,
            recipient_address: None,
            shipping_status: status,
            paid_amount: None,
            sheet_date: None,
            payment_date: Some(now),
            enrichment_status: if price.is_some() {
                EnrichmentStatus::Resolved
            } else {
                EnrichmentStatus::UnresolvedOption
            },
            catalog_entry_id: price.map(|_| Uuid::new_v4()),
            matched_option_name: None,
            supply_price: price,
            shipping_entity: None,
            invoice_entity: None,
            vendor_ref: None,
            discount_rate: None,
            settlement_amount: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
        }
    }

    fn record(date: NaiveDate, gross: Decimal, net: Decimal, status: SettlementStatus) -> SettlementRecord {
        let now = Utc::now();
        SettlementRecord {
            id: Uuid::new_v4(),
            organization_id: "org-1".to_string(),
            settlement_date: date,
            order_count: 2,
            cancelled_count: 0,
            refunded_count: 0,
            unresolved_count: 1,
            total_quantity: 4,
            gross_amount: gross,
            discount_total: gross - net,
            net_amount: net,
            discount_rate: dec!(0.03),
            tier_name: None,
            status,
            source_digest: String::new(),
            confirmed_by: None,
            confirmed_at: None,
            reopened_by: None,
            reopened_at: None,
            reopen_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_compute_totals() {
        let orders = vec![
            order(Some(dec!(5000)), 3, ShippingStatus::Delivered),
            order(Some(dec!(1000)), 2, ShippingStatus::Shipped),
            order(Some(dec!(9000)), 1, ShippingStatus::Cancelled),
            order(Some(dec!(9000)), 1, ShippingStatus::Refunded),
            order(None, 5, ShippingStatus::Received),
        ];
        let result = compute(&orders, dec!(0.03), 0);

        assert_eq!(result.order_count, 2);
        assert_eq!(result.cancelled_count, 1);
        assert_eq!(result.refunded_count, 1);
        assert_eq!(result.unresolved_count, 1);
        assert_eq!(result.total_quantity, 5);
        assert_eq!(result.gross_amount, dec!(17000));
        assert_eq!(result.net_amount, dec!(16490));
        assert_eq!(result.discount_total, dec!(510));
    }

    #[test]
    fn test_compute_is_order_independent() {
        let a = order(Some(dec!(5000)), 3, ShippingStatus::Delivered);
        let b = order(Some(dec!(1200)), 1, ShippingStatus::Delivered);
        let first = compute(&[a.clone(), b.clone()], dec!(0.03), 0);
        let second = compute(&[b, a], dec!(0.03), 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_deleted_orders_excluded() {
        let a = order(Some(dec!(5000)), 3, ShippingStatus::Delivered);
        let mut b = order(Some(dec!(1200)), 1, ShippingStatus::Delivered);
        let before = compute(&[a.clone(), b.clone()], Decimal::ZERO, 0);
        b.is_deleted = true;
        let after = compute(&[a, b], Decimal::ZERO, 0);

        assert!(after.net_amount < before.net_amount);
        assert_ne!(after.source_digest, before.source_digest);
    }

    #[test]
    fn test_digest_depends_on_rate() {
        let a = order(Some(dec!(5000)), 3, ShippingStatus::Delivered);
        let first = compute(std::slice::from_ref(&a), dec!(0.03), 0);
        let second = compute(&[a], dec!(0.05), 0);
        assert_ne!(first.source_digest, second.source_digest);
    }

    #[test]
    fn test_settlement_window_kst() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (start, end) = settlement_window(date, 540).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-02-28T15:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-03-01T15:00:00+00:00");
    }

    #[test]
    fn test_summarize_and_group_by_month() {
        let records = vec![
            record(
                NaiveDate::from_ymd_opt(2026, 2, 27).unwrap(),
                dec!(1000),
                dec!(970),
                SettlementStatus::Confirmed,
            ),
            record(
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                dec!(2000),
                dec!(1940),
                SettlementStatus::Draft,
            ),
            record(
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                dec!(3000),
                dec!(2910),
                SettlementStatus::Confirmed,
            ),
        ];

        let summary = summarize(&records);
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.confirmed_count, 2);
        assert_eq!(summary.order_count, 6);
        assert_eq!(summary.net_amount, dec!(5820));
        assert_eq!(summary.discount_total, dec!(180));

        let months = group_by_month(&records);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2026-02");
        assert_eq!(months[1].month, "2026-03");
        assert_eq!(months[1].day_count, 2);
        assert_eq!(months[1].confirmed_days, 1);
        assert_eq!(months[1].gross_amount, dec!(5000));
    }
}
