//! 映射配置仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::MappingProfileRepositoryTrait;
use crate::error::Result;
use crate::models::MappingProfile;

/// 映射配置仓储
///
/// 配置由运营后台维护，这里只读取启用的配置
pub struct MappingProfileRepository {
    pool: PgPool,
}

impl MappingProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出全部启用的映射配置
    pub async fn list_active_profiles(&self) -> Result<Vec<MappingProfile>> {
        let profiles = sqlx::query_as::<_, MappingProfile>(
            r#"
            SELECT id, marketplace, version, active, rules, detect_strings,
                   header_row, date_format, utc_offset_minutes, updated_at
            FROM mapping_profiles
            WHERE active = TRUE
            ORDER BY marketplace, version DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }
}

#[async_trait]
impl MappingProfileRepositoryTrait for MappingProfileRepository {
    async fn list_active_profiles(&self) -> Result<Vec<MappingProfile>> {
        self.list_active_profiles().await
    }
}
