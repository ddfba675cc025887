//! 目录匹配服务
//!
//! 批量加载一批订单可能命中的目录条目与组织别名，再逐单调用匹配引擎。

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use order_shared::observability::metrics;

use crate::engine::enrichment::{self, AliasTable, CatalogIndex, EnrichmentResult, EnrichmentWarning};
use crate::error::Result;
use crate::models::{CanonicalOrderDraft, EnrichmentStatus};
use crate::repository::CatalogRepositoryTrait;

/// 目录匹配服务
pub struct EnrichmentService {
    catalog: Arc<dyn CatalogRepositoryTrait>,
    money_scale: u32,
}

impl EnrichmentService {
    pub fn new(catalog: Arc<dyn CatalogRepositoryTrait>, money_scale: u32) -> Self {
        Self {
            catalog,
            money_scale,
        }
    }

    /// 为同一组织的一批草稿匹配目录，结果与输入一一对应
    #[instrument(skip_all, fields(organization_id = %organization_id, count = drafts.len()))]
    pub async fn enrich_batch(
        &self,
        organization_id: &str,
        drafts: &[CanonicalOrderDraft],
        discount_rate: Decimal,
    ) -> Result<Vec<EnrichmentResult>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let aliases = AliasTable::new(self.catalog.list_aliases(organization_id).await?);

        let mut names = BTreeSet::new();
        let mut codes = BTreeSet::new();
        for draft in drafts {
            let name = aliases
                .resolve(&draft.option_name)
                .unwrap_or(draft.option_name.as_str());
            names.insert(name.trim().to_string());
            if let Some(code) = draft.option_code.as_deref() {
                codes.insert(code.trim().to_string());
            }
        }
        let names: Vec<String> = names.into_iter().collect();
        let codes: Vec<String> = codes.into_iter().collect();

        let index = CatalogIndex::build(self.catalog.find_entries(&names, &codes).await?);

        let results: Vec<EnrichmentResult> = drafts
            .iter()
            .map(|draft| enrichment::enrich(draft, &index, &aliases, discount_rate, self.money_scale))
            .collect();

        for result in &results {
            let outcome = match result.enrichment.status {
                EnrichmentStatus::Resolved => "resolved",
                EnrichmentStatus::UnresolvedOption => "unresolved",
            };
            metrics::record_enrichment(outcome);
            if result
                .warnings
                .iter()
                .any(|w| matches!(w, EnrichmentWarning::DuplicateCatalogEntry { .. }))
            {
                metrics::record_enrichment("duplicate");
            }
        }

        Ok(results)
    }
}
