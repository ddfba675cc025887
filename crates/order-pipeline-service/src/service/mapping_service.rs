//! 映射配置服务
//!
//! 启用的映射配置经短 TTL 缓存读取，运营修改配置后无需重启即可生效。

use std::sync::Arc;

use tracing::{debug, instrument};

use order_shared::cache::TtlCache;

use crate::engine::resolver::{self, ResolvedMapping};
use crate::error::{PipelineError, Result};
use crate::models::MappingProfile;
use crate::repository::MappingProfileRepositoryTrait;

const ACTIVE_PROFILES: &str = "active";

/// 映射配置服务
pub struct MappingService {
    repo: Arc<dyn MappingProfileRepositoryTrait>,
    cache: TtlCache<&'static str, Arc<Vec<MappingProfile>>>,
}

impl MappingService {
    pub fn new(repo: Arc<dyn MappingProfileRepositoryTrait>, ttl_seconds: u64) -> Self {
        Self {
            repo,
            cache: TtlCache::with_ttl_seconds("mapping_profiles", ttl_seconds),
        }
    }

    /// 全部启用的映射配置
    pub async fn active_profiles(&self) -> Result<Arc<Vec<MappingProfile>>> {
        let repo = self.repo.clone();
        self.cache
            .get_or_try_load(&ACTIVE_PROFILES, || async move {
                repo.list_active_profiles().await.map(Arc::new)
            })
            .await
    }

    /// 平台唯一启用的配置
    pub async fn profile(&self, marketplace: &str) -> Result<MappingProfile> {
        let profiles = self.active_profiles().await?;
        resolver::select_profile(&profiles, marketplace).cloned()
    }

    /// 解析 (平台, 表头) 对应的映射
    #[instrument(skip_all, fields(marketplace = %marketplace))]
    pub async fn resolve(&self, marketplace: &str, header: &[String]) -> Result<ResolvedMapping> {
        let profiles = self.active_profiles().await?;
        let mapping = resolver::resolve(&profiles, marketplace, header)?;
        debug!(
            profile_id = %mapping.profile_id,
            version = mapping.version,
            "映射解析完成"
        );
        Ok(mapping)
    }

    /// 根据表头识别平台
    #[instrument(skip_all)]
    pub async fn detect(&self, header: &[String]) -> Result<String> {
        let profiles = self.active_profiles().await?;
        resolver::detect_marketplace(&profiles, header)
    }

    /// 从原始表格识别平台并切出表头与数据行
    ///
    /// 各配置的表头行位置可能不同，逐个位置尝试识别
    pub async fn detect_sheet(
        &self,
        sheet: &[Vec<String>],
    ) -> Result<(String, Vec<String>, Vec<Vec<String>>)> {
        let profiles = self.active_profiles().await?;
        let mut header_rows: Vec<i32> = profiles.iter().map(|p| p.header_row).collect();
        header_rows.sort_unstable();
        header_rows.dedup();

        let mut last_error = PipelineError::UnknownMarketplace("<undetected>".to_string());
        for row in header_rows {
            let Some(header) = usize::try_from(row).ok().and_then(|i| sheet.get(i)) else {
                continue;
            };
            let candidates: Vec<MappingProfile> = profiles
                .iter()
                .filter(|p| p.header_row == row)
                .cloned()
                .collect();
            match resolver::detect_marketplace(&candidates, header) {
                Ok(marketplace) => {
                    let profile = resolver::select_profile(&profiles, &marketplace)?;
                    return split(profile, sheet.to_vec(), &marketplace)
                        .map(|(header, rows)| (marketplace, header, rows));
                }
                Err(e @ PipelineError::ConfigurationConflict { .. }) => return Err(e),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// 按平台配置切出表头与数据行
    pub async fn split_sheet(
        &self,
        marketplace: &str,
        sheet: Vec<Vec<String>>,
    ) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let profile = self.profile(marketplace).await?;
        split(&profile, sheet, marketplace)
    }

    /// 清空缓存，下次读取时重新加载
    pub async fn invalidate(&self) {
        self.cache.invalidate_all().await;
    }
}

fn split(
    profile: &MappingProfile,
    sheet: Vec<Vec<String>>,
    marketplace: &str,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    profile
        .split_sheet(sheet)
        .ok_or_else(|| PipelineError::Validation(format!(
            "表格行数不足，平台 {} 的表头应位于第 {} 行",
            marketplace,
            profile.header_row + 1
        )))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::{CanonicalField, ExtractionRule};
    use crate::repository::MockMappingProfileRepositoryTrait;

    fn profile(marketplace: &str, header_row: i32, detect: &[&str]) -> MappingProfile {
        MappingProfile {
            id: Uuid::new_v4(),
            marketplace: marketplace.to_string(),
            version: 1,
            active: true,
            rules: vec![
                ExtractionRule::new(CanonicalField::OptionName, "옵션명"),
                ExtractionRule::new(CanonicalField::Quantity, "수량"),
            ],
            detect_strings: detect.iter().map(|s| s.to_string()).collect(),
            header_row,
            date_format: "%Y-%m-%d".to_string(),
            utc_offset_minutes: 540,
            updated_at: Utc::now(),
        }
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_profiles_cached_within_ttl() {
        let mut repo = MockMappingProfileRepositoryTrait::new();
        repo.expect_list_active_profiles()
            .times(1)
            .returning(|| Ok(vec![profile("coupang", 0, &["옵션명"])]));
        let service = MappingService::new(Arc::new(repo), 60);

        let header = row(&["옵션명", "수량"]);
        assert!(service.resolve("coupang", &header).await.is_ok());
        assert!(service.resolve("coupang", &header).await.is_ok());
        assert!(matches!(
            service.resolve("gmarket", &header).await.unwrap_err(),
            PipelineError::UnknownMarketplace(_)
        ));
    }

    #[tokio::test]
    async fn test_detect_sheet_with_preamble() {
        let mut repo = MockMappingProfileRepositoryTrait::new();
        repo.expect_list_active_profiles().returning(|| {
            Ok(vec![
                profile("coupang", 0, &["묶음배송번호"]),
                profile("smartstore", 1, &["상품주문번호"]),
            ])
        });
        let service = MappingService::new(Arc::new(repo), 60);

        let sheet = vec![
            row(&["스마트스토어 주문 다운로드"]),
            row(&["상품주문번호", "옵션명", "수량"]),
            row(&["1001", "사과 1kg", "2"]),
        ];
        let (marketplace, header, rows) = service.detect_sheet(&sheet).await.unwrap();
        assert_eq!(marketplace, "smartstore");
        assert_eq!(header[0], "상품주문번호");
        assert_eq!(rows.len(), 1);
    }
}
