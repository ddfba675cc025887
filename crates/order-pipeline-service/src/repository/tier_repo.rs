//! 等级仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::TierRepositoryTrait;
use crate::error::Result;
use crate::models::{ManualTierOverride, TierCriterion};

/// 等级标准与手动等级仓储
pub struct TierRepository {
    pool: PgPool,
}

impl TierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 等级标准 ====================

    pub async fn list_criteria(&self) -> Result<Vec<TierCriterion>> {
        let criteria = sqlx::query_as::<_, TierCriterion>(
            r#"
            SELECT name, rank, min_order_count, min_total_sales, discount_rate
            FROM tier_criteria
            ORDER BY rank
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(criteria)
    }

    /// 在一个事务内整体替换等级标准
    pub async fn replace_criteria(&self, criteria: &[TierCriterion]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tier_criteria")
            .execute(&mut *tx)
            .await?;

        for c in criteria {
            sqlx::query(
                r#"
                INSERT INTO tier_criteria (name, rank, min_order_count, min_total_sales, discount_rate)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&c.name)
            .bind(c.rank)
            .bind(c.min_order_count)
            .bind(c.min_total_sales)
            .bind(c.discount_rate)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ==================== 手动等级 ====================

    pub async fn get_manual_override(
        &self,
        organization_id: &str,
    ) -> Result<Option<ManualTierOverride>> {
        let manual = sqlx::query_as::<_, ManualTierOverride>(
            r#"
            SELECT organization_id, tier_name, actor_id, updated_at
            FROM manual_tier_overrides
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(manual)
    }

    pub async fn set_manual_override(&self, manual: &ManualTierOverride) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO manual_tier_overrides (organization_id, tier_name, actor_id, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (organization_id) DO UPDATE
            SET tier_name = EXCLUDED.tier_name,
                actor_id = EXCLUDED.actor_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&manual.organization_id)
        .bind(&manual.tier_name)
        .bind(&manual.actor_id)
        .bind(manual.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn clear_manual_override(&self, organization_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM manual_tier_overrides WHERE organization_id = $1")
            .bind(organization_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TierRepositoryTrait for TierRepository {
    async fn list_criteria(&self) -> Result<Vec<TierCriterion>> {
        self.list_criteria().await
    }

    async fn replace_criteria(&self, criteria: &[TierCriterion]) -> Result<()> {
        self.replace_criteria(criteria).await
    }

    async fn get_manual_override(
        &self,
        organization_id: &str,
    ) -> Result<Option<ManualTierOverride>> {
        self.get_manual_override(organization_id).await
    }

    async fn set_manual_override(&self, manual: &ManualTierOverride) -> Result<()> {
        self.set_manual_override(manual).await
    }

    async fn clear_manual_override(&self, organization_id: &str) -> Result<bool> {
        self.clear_manual_override(organization_id).await
    }
}
