//! 规范订单仓储
//!
//! 订单只做软删除；物理删除仅限管理员对已软删除订单执行清除

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::traits::OrderRepositoryTrait;
use crate::error::Result;
use crate::models::{CanonicalOrder, OrderVolume};

const ORDER_COLUMNS: &str = r#"
    id, organization_id, marketplace, batch_id, seller_order_number, option_name,
    option_code, quantity, recipient_name, recipient_phone, recipient_address,
    shipping_status, paid_amount, sheet_date, payment_date, enrichment_status,
    catalog_entry_id, matched_option_name, supply_price, shipping_entity,
    invoice_entity, vendor_ref, discount_rate, settlement_amount, is_deleted,
    deleted_at, deleted_by, created_at
"#;

/// 规范订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    pub async fn get_order(&self, id: Uuid) -> Result<Option<CanonicalOrder>> {
        let sql = format!("SELECT {} FROM canonical_orders WHERE id = $1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, CanonicalOrder>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// 结算区间内未删除的订单，按 ID 排序
    pub async fn list_for_settlement(
        &self,
        organization_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalOrder>> {
        let sql = format!(
            r#"
            SELECT {} FROM canonical_orders
            WHERE organization_id = $1
              AND is_deleted = FALSE
              AND payment_date >= $2 AND payment_date < $3
            ORDER BY id
            "#,
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, CanonicalOrder>(&sql)
            .bind(organization_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// 统计窗口内的有效订单量
    pub async fn order_volume(
        &self,
        organization_id: &str,
        since: DateTime<Utc>,
    ) -> Result<OrderVolume> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS order_count,
                   COALESCE(
                       SUM(supply_price * quantity) FILTER (
                           WHERE enrichment_status = 'RESOLVED' AND supply_price IS NOT NULL
                       ),
                       0
                   ) AS total_sales
            FROM canonical_orders
            WHERE organization_id = $1
              AND is_deleted = FALSE
              AND shipping_status NOT IN ('CANCELLED', 'REFUNDED')
              AND payment_date >= $2
            "#,
        )
        .bind(organization_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderVolume {
            order_count: row.try_get::<i64, _>("order_count")?,
            total_sales: row.try_get::<Decimal, _>("total_sales")?,
        })
    }

    // ==================== 写入操作 ====================

    /// 在一个事务内批量写入订单
    pub async fn insert_orders(&self, orders: &[CanonicalOrder]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for o in orders {
            let result = sqlx::query(
                r#"
                INSERT INTO canonical_orders (
                    id, organization_id, marketplace, batch_id, seller_order_number, option_name,
                    option_code, quantity, recipient_name, recipient_phone, recipient_address,
                    shipping_status, paid_amount, sheet_date, payment_date, enrichment_status,
                    catalog_entry_id, matched_option_name, supply_price, shipping_entity,
                    invoice_entity, vendor_ref, discount_rate, settlement_amount, is_deleted,
                    deleted_at, deleted_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28)
                "#,
            )
            .bind(o.id)
            .bind(&o.organization_id)
            .bind(&o.marketplace)
            .bind(o.batch_id)
            .bind(&o.seller_order_number)
            .bind(&o.option_name)
            .bind(&o.option_code)
            .bind(o.quantity)
            .bind(&o.recipient_name)
            .bind(&o.recipient_phone)
            .bind(&o.recipient_address)
            .bind(o.shipping_status)
            .bind(o.paid_amount)
            .bind(o.sheet_date)
            .bind(o.payment_date)
            .bind(o.enrichment_status)
            .bind(o.catalog_entry_id)
            .bind(&o.matched_option_name)
            .bind(o.supply_price)
            .bind(&o.shipping_entity)
            .bind(&o.invoice_entity)
            .bind(&o.vendor_ref)
            .bind(o.discount_rate)
            .bind(o.settlement_amount)
            .bind(o.is_deleted)
            .bind(o.deleted_at)
            .bind(&o.deleted_by)
            .bind(o.created_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// 设置或撤销软删除
    pub async fn set_deleted(
        &self,
        id: Uuid,
        deleted: bool,
        actor_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<CanonicalOrder>> {
        let sql = format!(
            r#"
            UPDATE canonical_orders
            SET is_deleted = $2,
                deleted_at = CASE WHEN $2 THEN $3 ELSE NULL END,
                deleted_by = CASE WHEN $2 THEN $4 ELSE NULL END
            WHERE id = $1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, CanonicalOrder>(&sql)
            .bind(id)
            .bind(deleted)
            .bind(at)
            .bind(actor_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// 清除已软删除的订单
    pub async fn purge_order(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM canonical_orders WHERE id = $1 AND is_deleted = TRUE")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn insert_orders(&self, orders: &[CanonicalOrder]) -> Result<u64> {
        self.insert_orders(orders).await
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<CanonicalOrder>> {
        self.get_order(id).await
    }

    async fn set_deleted<'a>(
        &self,
        id: Uuid,
        deleted: bool,
        actor_id: Option<&'a str>,
        at: DateTime<Utc>,
    ) -> Result<Option<CanonicalOrder>> {
        self.set_deleted(id, deleted, actor_id, at).await
    }

    async fn purge_order(&self, id: Uuid) -> Result<bool> {
        self.purge_order(id).await
    }

    async fn list_for_settlement(
        &self,
        organization_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalOrder>> {
        self.list_for_settlement(organization_id, from, to).await
    }

    async fn order_volume(
        &self,
        organization_id: &str,
        since: DateTime<Utc>,
    ) -> Result<OrderVolume> {
        self.order_volume(organization_id, since).await
    }
}
