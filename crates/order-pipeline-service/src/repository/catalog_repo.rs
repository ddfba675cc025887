//! 选项目录仓储
//!
//! 目录由商品主数据维护，流水线只读

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::CatalogRepositoryTrait;
use crate::error::Result;
use crate::models::{OptionAlias, OptionCatalogEntry};

/// 选项目录仓储
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按选项名或选项编码批量查询
    ///
    /// 同名条目全部返回，由匹配引擎决定取舍
    pub async fn find_entries(
        &self,
        option_names: &[String],
        option_codes: &[String],
    ) -> Result<Vec<OptionCatalogEntry>> {
        if option_names.is_empty() && option_codes.is_empty() {
            return Ok(Vec::new());
        }

        let entries = sqlx::query_as::<_, OptionCatalogEntry>(
            r#"
            SELECT id, option_code, option_name, supply_price, shipping_entity,
                   invoice_entity, vendor_ref, category_path, status, updated_at
            FROM option_catalog
            WHERE option_name = ANY($1) OR option_code = ANY($2)
            "#,
        )
        .bind(option_names)
        .bind(option_codes)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 组织的选项别名
    pub async fn list_aliases(&self, organization_id: &str) -> Result<Vec<OptionAlias>> {
        let aliases = sqlx::query_as::<_, OptionAlias>(
            r#"
            SELECT organization_id, user_option_name, site_option_name
            FROM option_aliases
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(aliases)
    }
}

#[async_trait]
impl CatalogRepositoryTrait for CatalogRepository {
    async fn find_entries(
        &self,
        option_names: &[String],
        option_codes: &[String],
    ) -> Result<Vec<OptionCatalogEntry>> {
        self.find_entries(option_names, option_codes).await
    }

    async fn list_aliases(&self, organization_id: &str) -> Result<Vec<OptionAlias>> {
        self.list_aliases(organization_id).await
    }
}
