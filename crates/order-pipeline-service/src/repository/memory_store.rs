//! 内存流水线存储
//!
//! 同时实现映射、目录、等级、订单、结算五个仓储接口，供测试和单机演示模式使用。
//! 订单与结算单用 DashMap 保存；等级标准等整体替换的数据用 `parking_lot::RwLock`。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::traits::{
    CatalogRepositoryTrait, MappingProfileRepositoryTrait, OrderRepositoryTrait,
    SettlementRepositoryTrait, TierRepositoryTrait,
};
use crate::error::Result;
use crate::models::{
    CanonicalOrder, ManualTierOverride, MappingProfile, OptionAlias, OptionCatalogEntry,
    OrderVolume, SettlementRecord, SettlementStatus, TierCriterion,
};

/// 内存流水线存储
#[derive(Debug, Default)]
pub struct MemoryPipelineStore {
    profiles: RwLock<Vec<MappingProfile>>,
    catalog: RwLock<Vec<OptionCatalogEntry>>,
    aliases: RwLock<Vec<OptionAlias>>,
    criteria: RwLock<Vec<TierCriterion>>,
    manual_tiers: DashMap<String, ManualTierOverride>,
    orders: DashMap<Uuid, CanonicalOrder>,
    settlements: DashMap<(String, NaiveDate), SettlementRecord>,
    settlement_keys: DashMap<Uuid, (String, NaiveDate)>,
}

impl MemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    // 数据准备

    pub fn add_profile(&self, profile: MappingProfile) {
        self.profiles.write().push(profile);
    }

    pub fn add_catalog_entry(&self, entry: OptionCatalogEntry) {
        self.catalog.write().push(entry);
    }

    pub fn add_alias(&self, alias: OptionAlias) {
        self.aliases.write().push(alias);
    }

    pub fn set_criteria(&self, criteria: Vec<TierCriterion>) {
        *self.criteria.write() = criteria;
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[async_trait]
impl MappingProfileRepositoryTrait for MemoryPipelineStore {
    async fn list_active_profiles(&self) -> Result<Vec<MappingProfile>> {
        Ok(self
            .profiles
            .read()
            .iter()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogRepositoryTrait for MemoryPipelineStore {
    async fn find_entries(
        &self,
        option_names: &[String],
        option_codes: &[String],
    ) -> Result<Vec<OptionCatalogEntry>> {
        Ok(self
            .catalog
            .read()
            .iter()
            .filter(|e| {
                option_names.contains(&e.option_name)
                    || e
                        .option_code
                        .as_ref()
                        .is_some_and(|code| option_codes.contains(code))
            })
            .cloned()
            .collect())
    }

    async fn list_aliases(&self, organization_id: &str) -> Result<Vec<OptionAlias>> {
        Ok(self
            .aliases
            .read()
            .iter()
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TierRepositoryTrait for MemoryPipelineStore {
    async fn list_criteria(&self) -> Result<Vec<TierCriterion>> {
        Ok(self.criteria.read().clone())
    }

    async fn replace_criteria(&self, criteria: &[TierCriterion]) -> Result<()> {
        *self.criteria.write() = criteria.to_vec();
        Ok(())
    }

    async fn get_manual_override(
        &self,
        organization_id: &str,
    ) -> Result<Option<ManualTierOverride>> {
        Ok(self
            .manual_tiers
            .get(organization_id)
            .map(|m| m.value().clone()))
    }

    async fn set_manual_override(&self, manual: &ManualTierOverride) -> Result<()> {
        self.manual_tiers
            .insert(manual.organization_id.clone(), manual.clone());
        Ok(())
    }

    async fn clear_manual_override(&self, organization_id: &str) -> Result<bool> {
        Ok(self.manual_tiers.remove(organization_id).is_some())
    }
}

#[async_trait]
impl OrderRepositoryTrait for MemoryPipelineStore {
    async fn insert_orders(&self, orders: &[CanonicalOrder]) -> Result<u64> {
        for order in orders {
            self.orders.insert(order.id, order.clone());
        }
        Ok(orders.len() as u64)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<CanonicalOrder>> {
        Ok(self.orders.get(&id).map(|o| o.value().clone()))
    }

    async fn set_deleted<'a>(
        &self,
        id: Uuid,
        deleted: bool,
        actor_id: Option<&'a str>,
        at: DateTime<Utc>,
    ) -> Result<Option<CanonicalOrder>> {
        Ok(self.orders.get_mut(&id).map(|mut order| {
            order.is_deleted = deleted;
            if deleted {
                order.deleted_at = Some(at);
                order.deleted_by = actor_id.map(str::to_string);
            } else {
                order.deleted_at = None;
                order.deleted_by = None;
            }
            order.clone()
        }))
    }

    async fn purge_order(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .orders
            .remove_if(&id, |_, order| order.is_deleted)
            .is_some())
    }

    async fn list_for_settlement(
        &self,
        organization_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalOrder>> {
        let mut orders: Vec<CanonicalOrder> = self
            .orders
            .iter()
            .filter(|o| {
                o.organization_id == organization_id
                    && !o.is_deleted
                    && o.payment_date.is_some_and(|paid| paid >= from && paid < to)
            })
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn order_volume(
        &self,
        organization_id: &str,
        since: DateTime<Utc>,
    ) -> Result<OrderVolume> {
        let mut volume = OrderVolume::default();
        for order in self.orders.iter() {
            if order.organization_id != organization_id
                || order.is_deleted
                || !order.shipping_status.is_billable()
                || !order.payment_date.is_some_and(|paid| paid >= since)
            {
                continue;
            }
            volume.order_count += 1;
            if let Some(price) = order.supply_price.filter(|_| order.is_resolved()) {
                volume.total_sales += price * Decimal::from(order.quantity);
            }
        }
        Ok(volume)
    }
}

#[async_trait]
impl SettlementRepositoryTrait for MemoryPipelineStore {
    async fn find_by_key(
        &self,
        organization_id: &str,
        settlement_date: NaiveDate,
    ) -> Result<Option<SettlementRecord>> {
        Ok(self
            .settlements
            .get(&(organization_id.to_string(), settlement_date))
            .map(|r| r.value().clone()))
    }

    async fn get_settlement(&self, id: Uuid) -> Result<Option<SettlementRecord>> {
        let Some(key) = self.settlement_keys.get(&id).map(|k| k.value().clone()) else {
            return Ok(None);
        };
        Ok(self.settlements.get(&key).map(|r| r.value().clone()))
    }

    async fn upsert_draft(&self, record: &SettlementRecord) -> Result<bool> {
        let key = (record.organization_id.clone(), record.settlement_date);
        let mut entry = self.settlements.entry(key.clone()).or_insert_with(|| {
            self.settlement_keys.insert(record.id, key.clone());
            record.clone()
        });

        if entry.is_confirmed() {
            return Ok(false);
        }

        // 保留首次写入的 ID、创建时间以及确认与重新打开记录
        let previous = entry.clone();
        *entry = SettlementRecord {
            id: previous.id,
            created_at: previous.created_at,
            status: SettlementStatus::Draft,
            confirmed_by: previous.confirmed_by,
            confirmed_at: previous.confirmed_at,
            reopened_by: previous.reopened_by,
            reopened_at: previous.reopened_at,
            reopen_reason: previous.reopen_reason,
            ..record.clone()
        };
        Ok(true)
    }

    async fn mark_confirmed(
        &self,
        id: Uuid,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>> {
        let Some(key) = self.settlement_keys.get(&id).map(|k| k.value().clone()) else {
            return Ok(None);
        };
        Ok(self.settlements.get_mut(&key).and_then(|mut record| {
            if record.status != SettlementStatus::Draft {
                return None;
            }
            record.status = SettlementStatus::Confirmed;
            record.confirmed_by = Some(actor_id.to_string());
            record.confirmed_at = Some(at);
            record.updated_at = at;
            Some(record.clone())
        }))
    }

    async fn mark_reopened(
        &self,
        id: Uuid,
        actor_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>> {
        let Some(key) = self.settlement_keys.get(&id).map(|k| k.value().clone()) else {
            return Ok(None);
        };
        Ok(self.settlements.get_mut(&key).and_then(|mut record| {
            if record.status != SettlementStatus::Confirmed {
                return None;
            }
            record.status = SettlementStatus::Draft;
            record.reopened_by = Some(actor_id.to_string());
            record.reopened_at = Some(at);
            record.reopen_reason = Some(reason.to_string());
            record.updated_at = at;
            Some(record.clone())
        }))
    }

    async fn list_range<'a>(
        &self,
        organization_id: Option<&'a str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SettlementRecord>> {
        let mut records: Vec<SettlementRecord> = self
            .settlements
            .iter()
            .filter(|r| {
                organization_id.is_none_or(|org| r.organization_id == org)
                    && r.settlement_date >= from
                    && r.settlement_date <= to
            })
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            a.organization_id
                .cmp(&b.organization_id)
                .then(a.settlement_date.cmp(&b.settlement_date))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{EnrichmentStatus, ShippingStatus};

    fn order(org: &str, price: Option<Decimal>, status: ShippingStatus, paid: DateTime<Utc>) -> CanonicalOrder {
        CanonicalOrder {
            id: Uuid::new_v4(),
            organization_id: org.to_string(),
            marketplace: "coupang".to_string(),
            batch_id: Uuid::nil(),
            seller_order_number: None,
            option_name: "사과 1kg".to_string(),
            option_code: None,
            quantity: 2,
            recipient_name: None,
            recipient_phone: None,
            recipient_address: None,
            shipping_status: status,
            paid_amount: None,
            sheet_date: None,
            payment_date: Some(paid),
            enrichment_status: if price.is_some() {
                EnrichmentStatus::Resolved
            } else {
                EnrichmentStatus::UnresolvedOption
            },
            catalog_entry_id: None,
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
            created_at: paid,
        }
    }

    #[tokio::test]
    async fn test_order_volume_excludes_cancelled_and_deleted() {
        let store = MemoryPipelineStore::new();
        let now = Utc::now();
        let kept = order("org-1", Some(dec!(1000)), ShippingStatus::Delivered, now);
        let unresolved = order("org-1", None, ShippingStatus::Received, now);
        let cancelled = order("org-1", Some(dec!(1000)), ShippingStatus::Cancelled, now);
        let old = order("org-1", Some(dec!(1000)), ShippingStatus::Delivered, now - Duration::days(40));
        let deleted = order("org-1", Some(dec!(1000)), ShippingStatus::Delivered, now);
        let other = order("org-2", Some(dec!(1000)), ShippingStatus::Delivered, now);
        store
            .insert_orders(&[kept, unresolved, cancelled, old, deleted.clone(), other])
            .await
            .unwrap();
        store.set_deleted(deleted.id, true, Some("admin"), now).await.unwrap();

        let volume = store
            .order_volume("org-1", now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(volume.order_count, 2);
        assert_eq!(volume.total_sales, dec!(2000));
    }

    #[tokio::test]
    async fn test_purge_requires_soft_delete() {
        let store = MemoryPipelineStore::new();
        let now = Utc::now();
        let o = order("org-1", None, ShippingStatus::Received, now);
        store.insert_orders(std::slice::from_ref(&o)).await.unwrap();

        assert!(!store.purge_order(o.id).await.unwrap());
        store.set_deleted(o.id, true, Some("admin"), now).await.unwrap();
        assert!(store.purge_order(o.id).await.unwrap());
        assert!(store.get_order(o.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirmed_settlement_not_overwritten() {
        let store = MemoryPipelineStore::new();
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let record = SettlementRecord {
            id: Uuid::new_v4(),
            organization_id: "org-1".to_string(),
            settlement_date: date,
            order_count: 1,
            cancelled_count: 0,
            refunded_count: 0,
            unresolved_count: 0,
            total_quantity: 1,
            gross_amount: dec!(1000),
            discount_total: dec!(0),
            net_amount: dec!(1000),
            discount_rate: dec!(0),
            tier_name: None,
            status: SettlementStatus::Draft,
            source_digest: "a".to_string(),
            confirmed_by: None,
            confirmed_at: None,
            reopened_by: None,
            reopened_at: None,
            reopen_reason: None,
            created_at: now,
            updated_at: now,
        };
        assert!(store.upsert_draft(&record).await.unwrap());

        let second = SettlementRecord {
            id: Uuid::new_v4(),
            net_amount: dec!(900),
            ..record.clone()
        };
        assert!(store.upsert_draft(&second).await.unwrap());
        let stored = store.find_by_key("org-1", date).await.unwrap().unwrap();
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.net_amount, dec!(900));

        store.mark_confirmed(record.id, "admin", now).await.unwrap().unwrap();
        assert!(!store.upsert_draft(&second).await.unwrap());
        assert!(store.mark_confirmed(record.id, "admin", now).await.unwrap().is_none());

        let reopened = store
            .mark_reopened(record.id, "auditor", "환불 누락", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reopened.status, SettlementStatus::Draft);
        assert_eq!(reopened.confirmed_by.as_deref(), Some("admin"));
        assert_eq!(reopened.reopened_by.as_deref(), Some("auditor"));
        assert_eq!(reopened.reopen_reason.as_deref(), Some("환불 누락"));

        // 重算草稿不会抹掉确认与重新打开记录
        assert!(store.upsert_draft(&second).await.unwrap());
        let recomputed = store.find_by_key("org-1", date).await.unwrap().unwrap();
        assert_eq!(recomputed.confirmed_by.as_deref(), Some("admin"));
        assert_eq!(recomputed.reopened_at, Some(now));
    }
}
