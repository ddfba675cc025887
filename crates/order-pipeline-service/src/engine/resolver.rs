//! 字段映射解析
//!
//! 根据平台和表头确定唯一启用的映射配置，并把每条提取规则绑定到具体列。
//! 本模块只做纯计算，配置的加载与缓存由 `MappingService` 负责。

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::transform::FieldTransform;
use crate::error::{PipelineError, Result};
use crate::models::{CanonicalField, MappingProfile};

/// 时区偏移上限（±14 小时）
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// 已绑定到列的字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedField {
    pub field: CanonicalField,
    /// 表头中找不到对应列时为空（仅限非必填字段）
    pub column_index: Option<usize>,
    /// 是否通过列序号兜底绑定
    pub bound_by_index: bool,
    pub default: Option<String>,
    pub transform: Option<FieldTransform>,
}

/// 解析完成的映射
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMapping {
    pub profile_id: Uuid,
    pub marketplace: String,
    pub version: i32,
    pub fields: Vec<ResolvedField>,
    pub date_format: String,
    pub utc_offset_minutes: i32,
    /// 绑定过程中的提示（如使用了序号兜底）
    pub warnings: Vec<String>,
}

impl ResolvedMapping {
    pub fn field(&self, field: CanonicalField) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.field == field)
    }
}

/// 选出平台唯一启用的映射配置
pub fn select_profile<'a>(
    profiles: &'a [MappingProfile],
    marketplace: &str,
) -> Result<&'a MappingProfile> {
    let mut candidates = profiles
        .iter()
        .filter(|p| p.active && p.marketplace == marketplace);

    match (candidates.next(), candidates.count()) {
        (None, _) => Err(PipelineError::UnknownMarketplace(marketplace.to_string())),
        (Some(profile), 0) => Ok(profile),
        (Some(_), rest) => Err(PipelineError::ConfigurationConflict {
            marketplace: marketplace.to_string(),
            count: rest + 1,
        }),
    }
}

/// 根据表头识别平台
///
/// 识别文本全部出现在表头中的启用配置视为命中，必须恰好命中一个平台
pub fn detect_marketplace(profiles: &[MappingProfile], header: &[String]) -> Result<String> {
    let matched: Vec<&str> = profiles
        .iter()
        .filter(|p| p.active && p.matches_header(header))
        .map(|p| p.marketplace.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    match matched.as_slice() {
        [] => Err(PipelineError::UnknownMarketplace("<undetected>".to_string())),
        [marketplace] => Ok(marketplace.to_string()),
        many => Err(PipelineError::ConfigurationConflict {
            marketplace: many.join(","),
            count: many.len(),
        }),
    }
}

/// 把配置中的规则绑定到表头
pub fn bind(profile: &MappingProfile, header: &[String]) -> Result<ResolvedMapping> {
    let invalid = |reason: String| PipelineError::InvalidProfile {
        marketplace: profile.marketplace.clone(),
        reason,
    };

    if profile.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(invalid(format!(
            "时区偏移超出范围: {} 分钟",
            profile.utc_offset_minutes
        )));
    }
    if profile.date_format.trim().is_empty() {
        return Err(invalid("日期格式为空".to_string()));
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(profile.rules.len());
    let mut warnings = Vec::new();

    for rule in &profile.rules {
        if !seen.insert(rule.field) {
            return Err(invalid(format!("字段 {} 存在重复规则", rule.field)));
        }

        let transform = match rule.transform.as_deref() {
            Some(id) => Some(
                FieldTransform::parse(id)
                    .ok_or_else(|| invalid(format!("未知的转换函数: {}", id)))?,
            ),
            None => None,
        };

        let source = &rule.source;
        if source.column.is_none() && !(source.index_fallback && source.index.is_some()) {
            return Err(invalid(format!(
                "字段 {} 未绑定列名，且未显式开启序号兜底",
                rule.field
            )));
        }

        // 1. 按列名绑定
        let by_name = source.column.as_deref().and_then(|column| {
            header
                .iter()
                .position(|h| h.trim() == column.trim())
        });

        // 2. 列名缺失时按序号兜底
        let (column_index, bound_by_index) = match by_name {
            Some(index) => (Some(index), false),
            None => match source.index {
                Some(index) if source.index_fallback && index < header.len() => {
                    let message = format!(
                        "字段 {} 未找到列 {}，按列序号 {} 绑定",
                        rule.field,
                        source.describe(),
                        index
                    );
                    warn!(
                        marketplace = %profile.marketplace,
                        version = profile.version,
                        field = %rule.field,
                        index,
                        "映射使用列序号兜底"
                    );
                    warnings.push(message);
                    (Some(index), true)
                }
                _ => (None, false),
            },
        };

        if column_index.is_none() {
            if rule.field.is_required() {
                return Err(PipelineError::MissingColumn {
                    marketplace: profile.marketplace.clone(),
                    field: rule.field,
                    column: source.describe(),
                });
            }
            warnings.push(format!(
                "字段 {} 未找到列 {}，整批使用默认值",
                rule.field,
                source.describe()
            ));
        }

        fields.push(ResolvedField {
            field: rule.field,
            column_index,
            bound_by_index,
            default: rule.default.clone(),
            transform,
        });
    }

    for required in [CanonicalField::OptionName, CanonicalField::Quantity] {
        if !seen.contains(&required) {
            return Err(invalid(format!("缺少必填字段 {} 的规则", required)));
        }
    }

    Ok(ResolvedMapping {
        profile_id: profile.id,
        marketplace: profile.marketplace.clone(),
        version: profile.version,
        fields,
        date_format: profile.date_format.clone(),
        utc_offset_minutes: profile.utc_offset_minutes,
        warnings,
    })
}

/// 解析 (平台, 表头) 对应的映射
pub fn resolve(
    profiles: &[MappingProfile],
    marketplace: &str,
    header: &[String],
) -> Result<ResolvedMapping> {
    let profile = select_profile(profiles, marketplace)?;
    bind(profile, header)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::ExtractionRule;

    fn profile(marketplace: &str, active: bool) -> MappingProfile {
        MappingProfile {
            id: Uuid::new_v4(),
            marketplace: marketplace.to_string(),
            version: 1,
            active,
            rules: vec![
                ExtractionRule::new(CanonicalField::OptionName, "옵션명"),
                ExtractionRule::new(CanonicalField::Quantity, "수량"),
                ExtractionRule::new(CanonicalField::RecipientName, "수취인"),
            ],
            detect_strings: vec!["옵션명".to_string(), "수취인".to_string()],
            header_row: 0,
            date_format: "%Y-%m-%d".to_string(),
            utc_offset_minutes: 540,
            updated_at: Utc::now(),
        }
    }

    fn header(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_unknown_marketplace() {
        let profiles = vec![profile("coupang", true), profile("smartstore", false)];
        let err = select_profile(&profiles, "smartstore").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownMarketplace(m) if m == "smartstore"));
    }

    #[test]
    fn test_configuration_conflict() {
        let profiles = vec![profile("coupang", true), profile("coupang", true)];
        let err = select_profile(&profiles, "coupang").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationConflict { count: 2, .. }));
    }

    #[test]
    fn test_inactive_profiles_ignored() {
        let profiles = vec![profile("coupang", false), profile("coupang", true)];
        assert!(select_profile(&profiles, "coupang").unwrap().active);
    }

    #[test]
    fn test_bind_by_column_name() {
        let p = profile("coupang", true);
        let mapping = bind(&p, &header(&["수취인", "옵션명", "수량"])).unwrap();
        assert_eq!(
            mapping.field(CanonicalField::OptionName).unwrap().column_index,
            Some(1)
        );
        assert_eq!(
            mapping.field(CanonicalField::RecipientName).unwrap().column_index,
            Some(0)
        );
        assert!(mapping.warnings.is_empty());
    }

    #[test]
    fn test_missing_required_column() {
        let p = profile("coupang", true);
        let err = bind(&p, &header(&["옵션명", "수취인"])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn {
                field: CanonicalField::Quantity,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_optional_column_is_unbound() {
        let p = profile("coupang", true);
        let mapping = bind(&p, &header(&["옵션명", "수량"])).unwrap();
        assert_eq!(
            mapping.field(CanonicalField::RecipientName).unwrap().column_index,
            None
        );
        assert_eq!(mapping.warnings.len(), 1);
        assert!(mapping.warnings[0].contains("수취인"));
    }

    #[test]
    fn test_index_fallback_only_when_flagged() {
        let mut p = profile("coupang", true);
        p.rules[1] = ExtractionRule::new(CanonicalField::Quantity, "주문수량").with_index_fallback(1);
        let mapping = bind(&p, &header(&["옵션명", "구매수", "수취인"])).unwrap();
        let quantity = mapping.field(CanonicalField::Quantity).unwrap();
        assert_eq!(quantity.column_index, Some(1));
        assert!(quantity.bound_by_index);
        assert_eq!(mapping.warnings.len(), 1);

        p.rules[1].source.index_fallback = false;
        assert!(bind(&p, &header(&["옵션명", "구매수", "수취인"])).is_err());
    }

    #[test]
    fn test_unknown_transform_rejected() {
        let mut p = profile("coupang", true);
        p.rules[2] = ExtractionRule::new(CanonicalField::RecipientName, "수취인")
            .with_transform("reverse");
        let err = bind(&p, &header(&["옵션명", "수량", "수취인"])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidProfile { .. }));
    }

    #[test]
    fn test_detect_marketplace() {
        let mut other = profile("smartstore", true);
        other.detect_strings = vec!["상품주문번호".to_string()];
        let profiles = vec![profile("coupang", true), other];

        assert_eq!(
            detect_marketplace(&profiles, &header(&["옵션명", "수량", "수취인"])).unwrap(),
            "coupang"
        );
        assert!(matches!(
            detect_marketplace(&profiles, &header(&["주문번호"])).unwrap_err(),
            PipelineError::UnknownMarketplace(_)
        ));
        assert!(matches!(
            detect_marketplace(
                &profiles,
                &header(&["옵션명", "수량", "수취인", "상품주문번호"])
            )
            .unwrap_err(),
            PipelineError::ConfigurationConflict { count: 2, .. }
        ));
    }
}
