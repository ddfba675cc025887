//! 订单导入服务
//!
//! 一次上传的处理流程：识别平台 -> 解析映射 -> 规范化 -> 评估等级 ->
//! 匹配目录 -> 写入规范订单。行级错误随报告返回，不中断整批导入；
//! 映射配置错误则整批失败，需要运营修复配置。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use order_shared::observability::metrics;

use super::{EnrichmentService, MappingService, TierService};
use crate::engine::enrichment::EnrichmentWarning;
use crate::engine::normalizer;
use crate::error::Result;
use crate::models::{CanonicalOrder, EnrichmentStatus, FieldWarning, RawBatch, RowRejection};
use crate::repository::OrderRepositoryTrait;

/// 成功导入的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedRow {
    pub order_id: Uuid,
    pub row_number: usize,
    pub enrichment_status: EnrichmentStatus,
    pub field_warnings: Vec<FieldWarning>,
    pub enrichment_warnings: Vec<EnrichmentWarning>,
}

/// 导入报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub batch_id: Uuid,
    pub organization_id: String,
    pub marketplace: String,
    pub profile_version: i32,
    pub tier_name: Option<String>,
    pub discount_rate: Decimal,
    pub accepted: usize,
    pub unresolved: usize,
    pub rows: Vec<IngestedRow>,
    pub rejected: Vec<RowRejection>,
    /// 映射绑定提示（如序号兜底）
    pub mapping_warnings: Vec<String>,
}

/// 订单导入服务
pub struct IngestionService {
    mapping: Arc<MappingService>,
    tiers: Arc<TierService>,
    enrichment: Arc<EnrichmentService>,
    orders: Arc<dyn OrderRepositoryTrait>,
    money_scale: u32,
}

impl IngestionService {
    pub fn new(
        mapping: Arc<MappingService>,
        tiers: Arc<TierService>,
        enrichment: Arc<EnrichmentService>,
        orders: Arc<dyn OrderRepositoryTrait>,
        money_scale: u32,
    ) -> Self {
        Self {
            mapping,
            tiers,
            enrichment,
            orders,
            money_scale,
        }
    }

    /// 导入原始表格
    ///
    /// 未指定平台时按表头识别；表头之前的说明行按配置跳过
    #[instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn ingest_sheet(
        &self,
        organization_id: &str,
        marketplace: Option<&str>,
        sheet: Vec<Vec<String>>,
    ) -> Result<IngestionReport> {
        let (marketplace, header, rows) = match marketplace {
            Some(marketplace) => {
                let (header, rows) = self.mapping.split_sheet(marketplace, sheet).await?;
                (marketplace.to_string(), header, rows)
            }
            None => self.mapping.detect_sheet(&sheet).await?,
        };

        self.ingest(RawBatch {
            batch_id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            marketplace,
            header,
            rows,
        })
        .await
    }

    /// 导入一批已拆出表头的原始行
    ///
    /// 平台为空时按表头识别
    #[instrument(skip_all, fields(batch_id = %batch.batch_id, organization_id = %batch.organization_id))]
    pub async fn ingest(&self, mut batch: RawBatch) -> Result<IngestionReport> {
        let start = Instant::now();

        if batch.marketplace.trim().is_empty() {
            batch.marketplace = self.mapping.detect(&batch.header).await?;
        }

        let mapping = self.mapping.resolve(&batch.marketplace, &batch.header).await?;
        let records = batch.records();
        let outcome = normalizer::normalize(
            &mapping,
            &batch.organization_id,
            &records,
            self.money_scale,
        );

        let now = Utc::now();
        let tier = self.tiers.get_tier(&batch.organization_id, now).await?;

        let drafts: Vec<_> = outcome.rows.iter().map(|row| row.draft.clone()).collect();
        let enriched = self
            .enrichment
            .enrich_batch(&batch.organization_id, &drafts, tier.discount_rate)
            .await?;

        let mut orders = Vec::with_capacity(drafts.len());
        let mut rows = Vec::with_capacity(drafts.len());
        for (normalized, result) in outcome.rows.into_iter().zip(enriched) {
            let order_id = Uuid::new_v4();
            rows.push(IngestedRow {
                order_id,
                row_number: normalized.draft.row_number,
                enrichment_status: result.enrichment.status,
                field_warnings: normalized.warnings,
                enrichment_warnings: result.warnings,
            });
            orders.push(CanonicalOrder::from_draft(
                order_id,
                normalized.draft,
                result.enrichment,
                now,
            ));
        }

        self.orders.insert_orders(&orders).await?;

        let unresolved = orders.iter().filter(|o| !o.is_resolved()).count();
        let report = IngestionReport {
            batch_id: batch.batch_id,
            organization_id: batch.organization_id,
            marketplace: batch.marketplace,
            profile_version: mapping.version,
            tier_name: tier.tier_name,
            discount_rate: tier.discount_rate,
            accepted: orders.len(),
            unresolved,
            rows,
            rejected: outcome.rejected,
            mapping_warnings: mapping.warnings,
        };

        metrics::record_ingestion(
            &report.marketplace,
            report.accepted,
            report.rejected.len(),
            start.elapsed().as_secs_f64(),
        );

        if !report.rejected.is_empty() {
            warn!(
                marketplace = %report.marketplace,
                rejected = report.rejected.len(),
                "部分行校验失败，已跳过"
            );
        }
        info!(
            marketplace = %report.marketplace,
            profile_version = report.profile_version,
            accepted = report.accepted,
            rejected = report.rejected.len(),
            unresolved = report.unresolved,
            "订单导入完成"
        );

        Ok(report)
    }
}
