//! 结算单仓储
//!
//! (organization_id, settlement_date) 唯一。写入是整条覆盖，
//! 条件更新保证确认状态的结算单不会被自动重算覆盖。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::SettlementRepositoryTrait;
use crate::error::Result;
use crate::models::SettlementRecord;

const SETTLEMENT_COLUMNS: &str = r#"
    id, organization_id, settlement_date, order_count, cancelled_count, refunded_count,
    unresolved_count, total_quantity, gross_amount, discount_total, net_amount,
    discount_rate, tier_name, status, source_digest, confirmed_by, confirmed_at,
    reopened_by, reopened_at, reopen_reason, created_at, updated_at
"#;

/// 结算单仓储
pub struct SettlementRepository {
    pool: PgPool,
}

impl SettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    pub async fn find_by_key(
        &self,
        organization_id: &str,
        settlement_date: NaiveDate,
    ) -> Result<Option<SettlementRecord>> {
        let sql = format!(
            "SELECT {} FROM settlement_records WHERE organization_id = $1 AND settlement_date = $2",
            SETTLEMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, SettlementRecord>(&sql)
            .bind(organization_id)
            .bind(settlement_date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn get_settlement(&self, id: Uuid) -> Result<Option<SettlementRecord>> {
        let sql = format!("SELECT {} FROM settlement_records WHERE id = $1", SETTLEMENT_COLUMNS);
        let record = sqlx::query_as::<_, SettlementRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn list_range(
        &self,
        organization_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SettlementRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM settlement_records
            WHERE ($1::varchar IS NULL OR organization_id = $1)
              AND settlement_date BETWEEN $2 AND $3
            ORDER BY organization_id, settlement_date
            "#,
            SETTLEMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, SettlementRecord>(&sql)
            .bind(organization_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    // ==================== 写入操作 ====================

    /// 整条写入草稿，确认与重新打开记录保持不变；已确认的结算单不更新（rows_affected = 0）
    pub async fn upsert_draft(&self, record: &SettlementRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO settlement_records (
                id, organization_id, settlement_date, order_count, cancelled_count,
                refunded_count, unresolved_count, total_quantity, gross_amount,
                discount_total, net_amount, discount_rate, tier_name, status,
                source_digest, confirmed_by, confirmed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'draft',
                    $14, NULL, NULL, $15, $16)
            ON CONFLICT (organization_id, settlement_date) DO UPDATE
            SET order_count = EXCLUDED.order_count,
                cancelled_count = EXCLUDED.cancelled_count,
                refunded_count = EXCLUDED.refunded_count,
                unresolved_count = EXCLUDED.unresolved_count,
                total_quantity = EXCLUDED.total_quantity,
                gross_amount = EXCLUDED.gross_amount,
                discount_total = EXCLUDED.discount_total,
                net_amount = EXCLUDED.net_amount,
                discount_rate = EXCLUDED.discount_rate,
                tier_name = EXCLUDED.tier_name,
                source_digest = EXCLUDED.source_digest,
                updated_at = EXCLUDED.updated_at
            WHERE settlement_records.status = 'draft'
            "#,
        )
        .bind(record.id)
        .bind(&record.organization_id)
        .bind(record.settlement_date)
        .bind(record.order_count)
        .bind(record.cancelled_count)
        .bind(record.refunded_count)
        .bind(record.unresolved_count)
        .bind(record.total_quantity)
        .bind(record.gross_amount)
        .bind(record.discount_total)
        .bind(record.net_amount)
        .bind(record.discount_rate)
        .bind(&record.tier_name)
        .bind(&record.source_digest)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_confirmed(
        &self,
        id: Uuid,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>> {
        let sql = format!(
            r#"
            UPDATE settlement_records
            SET status = 'confirmed', confirmed_by = $2, confirmed_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'draft'
            RETURNING {}
            "#,
            SETTLEMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, SettlementRecord>(&sql)
            .bind(id)
            .bind(actor_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn mark_reopened(
        &self,
        id: Uuid,
        actor_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>> {
        let sql = format!(
            r#"
            UPDATE settlement_records
            SET status = 'draft', reopened_by = $2, reopen_reason = $3,
                reopened_at = $4, updated_at = $4
            WHERE id = $1 AND status = 'confirmed'
            RETURNING {}
            "#,
            SETTLEMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, SettlementRecord>(&sql)
            .bind(id)
            .bind(actor_id)
            .bind(reason)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }
}

#[async_trait]
impl SettlementRepositoryTrait for SettlementRepository {
    async fn find_by_key(
        &self,
        organization_id: &str,
        settlement_date: NaiveDate,
    ) -> Result<Option<SettlementRecord>> {
        self.find_by_key(organization_id, settlement_date).await
    }

    async fn get_settlement(&self, id: Uuid) -> Result<Option<SettlementRecord>> {
        self.get_settlement(id).await
    }

    async fn upsert_draft(&self, record: &SettlementRecord) -> Result<bool> {
        self.upsert_draft(record).await
    }

    async fn mark_confirmed(
        &self,
        id: Uuid,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>> {
        self.mark_confirmed(id, actor_id, at).await
    }

    async fn mark_reopened(
        &self,
        id: Uuid,
        actor_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>> {
        self.mark_reopened(id, actor_id, reason, at).await
    }

    async fn list_range<'a>(
        &self,
        organization_id: Option<&'a str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SettlementRecord>> {
        self.list_range(organization_id, from, to).await
    }
}
