//! 订单规范化
//!
//! 把原始行按解析好的映射转换为规范订单草稿。纯函数，不读取系统时间，
//! 同一映射版本下相同输入总是得到完全相同的输出。
//!
//! ## 字段策略
//!
//! - 必填字段缺失或为空：整行拒绝，不使用默认值
//! - 可选字段为空或表头无对应列：使用规则默认值，没有规则默认值时使用字段默认值，两种情况都记录警告
//! - 已填写但格式错误的值：整行拒绝

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use order_shared::money;

use super::resolver::{ResolvedField, ResolvedMapping};
use crate::models::{
    CanonicalField, CanonicalOrderDraft, FieldError, FieldWarning, RawOrderRecord, RowRejection,
    ShippingStatus,
};

/// 规范化成功的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub draft: CanonicalOrderDraft,
    pub warnings: Vec<FieldWarning>,
}

/// 一批行的规范化结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationOutcome {
    pub rows: Vec<NormalizedRow>,
    pub rejected: Vec<RowRejection>,
}

/// 规范化一批原始行，输出保持输入顺序
pub fn normalize(
    mapping: &ResolvedMapping,
    organization_id: &str,
    records: &[RawOrderRecord],
    money_scale: u32,
) -> NormalizationOutcome {
    let mut outcome = NormalizationOutcome::default();

    for record in records {
        match normalize_row(mapping, organization_id, record, money_scale) {
            Ok(row) => outcome.rows.push(row),
            Err(errors) => outcome.rejected.push(RowRejection {
                row_number: record.row_number,
                errors,
            }),
        }
    }

    outcome
}

/// 行内字段收集器
#[derive(Default)]
struct RowBuilder {
    seller_order_number: Option<String>,
    option_name: Option<String>,
    option_code: Option<String>,
    quantity: Option<i32>,
    recipient_name: Option<String>,
    recipient_phone: Option<String>,
    recipient_address: Option<String>,
    shipping_status: Option<ShippingStatus>,
    paid_amount: Option<Decimal>,
    sheet_date: Option<DateTime<Utc>>,
    payment_date: Option<DateTime<Utc>>,
}

fn normalize_row(
    mapping: &ResolvedMapping,
    organization_id: &str,
    record: &RawOrderRecord,
    money_scale: u32,
) -> Result<NormalizedRow, Vec<FieldError>> {
    let mut row = RowBuilder::default();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for resolved in &mapping.fields {
        let field = resolved.field;

        let value = match extract(resolved, record) {
            Some(value) => value,
            None if field.is_required() => {
                errors.push(FieldError::new(field, "必填字段为空"));
                continue;
            }
            None => {
                let reason = if resolved.column_index.is_some() {
                    "值为空"
                } else {
                    "表头中没有对应列"
                };
                match &resolved.default {
                    Some(default) => {
                        warnings.push(FieldWarning {
                            field,
                            message: format!("{}，使用规则默认值 {}", reason, default),
                        });
                        default.clone()
                    }
                    None => {
                        warnings.push(FieldWarning {
                            field,
                            message: format!("{}，使用默认值", reason),
                        });
                        continue;
                    }
                }
            }
        };

        if let Err(message) = assign(&mut row, field, &value, mapping, money_scale, &mut warnings)
        {
            errors.push(FieldError::new(field, message));
        }
    }

    let (option_name, quantity) = match (row.option_name.take(), row.quantity) {
        (Some(name), Some(quantity)) => (name, quantity),
        (name, quantity) => {
            // 绑定阶段已保证必填字段有规则，这里兜底处理未报告的缺失
            if name.is_none() && !errors.iter().any(|e| e.field == CanonicalField::OptionName) {
                errors.push(FieldError::new(CanonicalField::OptionName, "必填字段为空"));
            }
            if quantity.is_none() && !errors.iter().any(|e| e.field == CanonicalField::Quantity) {
                errors.push(FieldError::new(CanonicalField::Quantity, "必填字段为空"));
            }
            return Err(errors);
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    let shipping_status = match row.shipping_status {
        Some(status) => status,
        None => {
            // 未映射配送状态的平台统一按已接单处理，不逐行警告
            let mapped = mapping.field(CanonicalField::ShippingStatus).is_some();
            if mapped
                && !warnings
                    .iter()
                    .any(|w| w.field == CanonicalField::ShippingStatus)
            {
                warnings.push(FieldWarning {
                    field: CanonicalField::ShippingStatus,
                    message: "未提供配送状态，按已接单处理".to_string(),
                });
            }
            ShippingStatus::default()
        }
    };

    Ok(NormalizedRow {
        draft: CanonicalOrderDraft {
            organization_id: organization_id.to_string(),
            marketplace: mapping.marketplace.clone(),
            batch_id: record.batch_id,
            row_number: record.row_number,
            profile_version: mapping.version,
            seller_order_number: row.seller_order_number,
            option_name,
            option_code: row.option_code,
            quantity,
            recipient_name: row.recipient_name,
            recipient_phone: row.recipient_phone,
            recipient_address: row.recipient_address,
            shipping_status,
            paid_amount: row.paid_amount,
            sheet_date: row.sheet_date,
            payment_date: row.payment_date,
        },
        warnings,
    })
}

/// 取出单元格并应用转换，空白视为缺失
fn extract(resolved: &ResolvedField, record: &RawOrderRecord) -> Option<String> {
    let raw = record.cell(resolved.column_index?)?;
    let value = match resolved.transform {
        Some(transform) => transform.apply(raw),
        None => raw.trim().to_string(),
    };
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn assign(
    row: &mut RowBuilder,
    field: CanonicalField,
    value: &str,
    mapping: &ResolvedMapping,
    money_scale: u32,
    warnings: &mut Vec<FieldWarning>,
) -> Result<(), String> {
    match field {
        CanonicalField::SellerOrderNumber => row.seller_order_number = Some(value.to_string()),
        CanonicalField::OptionName => row.option_name = Some(value.to_string()),
        CanonicalField::OptionCode => row.option_code = Some(value.to_string()),
        CanonicalField::Quantity => row.quantity = Some(parse_quantity(value)?),
        CanonicalField::RecipientName => row.recipient_name = Some(value.to_string()),
        CanonicalField::RecipientPhone => row.recipient_phone = Some(value.to_string()),
        CanonicalField::RecipientAddress => row.recipient_address = Some(value.to_string()),
        CanonicalField::ShippingStatus => match ShippingStatus::from_label(value) {
            Some(status) => row.shipping_status = Some(status),
            None => {
                warnings.push(FieldWarning {
                    field,
                    message: format!("未知的配送状态: {}，按已接单处理", value),
                });
                row.shipping_status = Some(ShippingStatus::default());
            }
        },
        CanonicalField::PaidAmount => {
            let amount = money::parse_amount(value, money_scale)
                .map_err(|_| format!("金额格式错误: {}", value))?;
            row.paid_amount = Some(amount);
        }
        CanonicalField::SheetDate => {
            row.sheet_date = Some(parse_datetime(
                value,
                &mapping.date_format,
                mapping.utc_offset_minutes,
            )?)
        }
        CanonicalField::PaymentDate => {
            row.payment_date = Some(parse_datetime(
                value,
                &mapping.date_format,
                mapping.utc_offset_minutes,
            )?)
        }
    }
    Ok(())
}

/// 解析正整数数量，允许千分位逗号
pub fn parse_quantity(value: &str) -> Result<i32, String> {
    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    match cleaned.trim().parse::<i32>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(format!("数量必须为正整数: {}", value)),
    }
}

/// 按平台日期格式解析，并以配置的固定偏移换算为 UTC
///
/// 只有日期部分时按当地零点处理
pub fn parse_datetime(
    value: &str,
    format: &str,
    utc_offset_minutes: i32,
) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(value, format)
        .or_else(|_| NaiveDate::parse_from_str(value, format).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| format!("日期格式错误: {}（期望 {}）", value, format))?;

    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .ok_or_else(|| format!("无效的时区偏移: {} 分钟", utc_offset_minutes))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("无法确定的本地时间: {}", value))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::engine::resolver::bind;
    use crate::models::{ExtractionRule, MappingProfile};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn mapping(rules: Vec<ExtractionRule>, header: &[&str]) -> ResolvedMapping {
        let profile = MappingProfile {
            id: Uuid::nil(),
            marketplace: "coupang".to_string(),
            version: 3,
            active: true,
            rules,
            detect_strings: vec![],
            header_row: 0,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            utc_offset_minutes: 540,
            updated_at: Utc::now(),
        };
        bind(&profile, &strings(header)).unwrap()
    }

    fn record(row_number: usize, cells: &[&str]) -> RawOrderRecord {
        RawOrderRecord {
            batch_id: Uuid::nil(),
            marketplace: "coupang".to_string(),
            row_number,
            cells: strings(cells),
        }
    }

    fn basic_rules() -> Vec<ExtractionRule> {
        vec![
            ExtractionRule::new(CanonicalField::OptionName, "옵션명"),
            ExtractionRule::new(CanonicalField::Quantity, "수량"),
            ExtractionRule::new(CanonicalField::RecipientName, "수취인"),
        ]
    }

    #[test]
    fn test_scenario_basic_mapping() {
        let mapping = mapping(basic_rules(), &["옵션명", "수량", "수취인"]);
        let outcome = normalize(&mapping, "org-1", &[record(1, &["사과 1kg", "3", "홍길동"])], 0);

        assert!(outcome.rejected.is_empty());
        let draft = &outcome.rows[0].draft;
        assert_eq!(draft.option_name, "사과 1kg");
        assert_eq!(draft.quantity, 3);
        assert_eq!(draft.recipient_name.as_deref(), Some("홍길동"));
        assert_eq!(draft.profile_version, 3);
    }

    #[test]
    fn test_empty_required_field_rejected() {
        let mapping = mapping(basic_rules(), &["옵션명", "수량", "수취인"]);
        let outcome = normalize(
            &mapping,
            "org-1",
            &[record(1, &["  ", "3", "홍길동"]), record(2, &["배", "2", "김철수"])],
            0,
        );

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].row_number, 1);
        assert_eq!(outcome.rejected[0].errors[0].field, CanonicalField::OptionName);
    }

    #[test]
    fn test_required_field_ignores_rule_default() {
        let mut rules = basic_rules();
        rules[0] = ExtractionRule::new(CanonicalField::OptionName, "옵션명").with_default("기본");
        let mapping = mapping(rules, &["옵션명", "수량", "수취인"]);
        let outcome = normalize(&mapping, "org-1", &[record(1, &["", "3", "홍길동"])], 0);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_invalid_quantity_rejected() {
        let mapping = mapping(basic_rules(), &["옵션명", "수량", "수취인"]);
        let outcome = normalize(
            &mapping,
            "org-1",
            &[
                record(1, &["사과", "0", "홍길동"]),
                record(2, &["사과", "-2", "홍길동"]),
                record(3, &["사과", "2.5", "홍길동"]),
                record(4, &["사과", "1,200", "홍길동"]),
            ],
            0,
        );
        assert_eq!(outcome.rejected.len(), 3);
        assert_eq!(outcome.rows[0].draft.quantity, 1200);
    }

    #[test]
    fn test_optional_missing_gets_warning() {
        let mapping = mapping(basic_rules(), &["옵션명", "수량", "수취인"]);
        let outcome = normalize(&mapping, "org-1", &[record(1, &["사과", "1", ""])], 0);
        let row = &outcome.rows[0];
        assert_eq!(row.draft.recipient_name, None);
        assert_eq!(row.warnings.len(), 1);
        assert_eq!(row.warnings[0].field, CanonicalField::RecipientName);
    }

    #[test]
    fn test_absent_optional_column_gets_warning() {
        let mapping = mapping(basic_rules(), &["옵션명", "수량"]);
        let outcome = normalize(&mapping, "org-1", &[record(1, &["사과", "1"])], 0);

        let row = &outcome.rows[0];
        assert_eq!(row.draft.recipient_name, None);
        assert_eq!(row.warnings.len(), 1);
        assert_eq!(row.warnings[0].field, CanonicalField::RecipientName);
        assert_eq!(mapping.warnings.len(), 1);
    }

    #[test]
    fn test_rule_default_applied_with_warning() {
        let mut rules = basic_rules();
        rules.push(ExtractionRule::new(CanonicalField::RecipientPhone, "연락처").with_default("000"));
        let mapping = mapping(rules, &["옵션명", "수량", "연락처"]);
        let outcome = normalize(&mapping, "org-1", &[record(1, &["사과", "1", ""])], 0);

        let row = &outcome.rows[0];
        assert_eq!(row.draft.recipient_name, None);
        assert_eq!(row.draft.recipient_phone.as_deref(), Some("000"));

        let fields: Vec<_> = row.warnings.iter().map(|w| w.field).collect();
        assert_eq!(
            fields,
            vec![CanonicalField::RecipientName, CanonicalField::RecipientPhone]
        );
        assert!(row.warnings[1].message.contains("000"));
    }

    #[test]
    fn test_money_and_dates() {
        let mut rules = basic_rules();
        rules.push(ExtractionRule::new(CanonicalField::PaidAmount, "결제금액"));
        rules.push(ExtractionRule::new(CanonicalField::PaymentDate, "결제일"));
        rules.push(
            ExtractionRule::new(CanonicalField::RecipientPhone, "연락처").with_transform("digits_only"),
        );
        let mapping = mapping(
            rules,
            &["옵션명", "수량", "수취인", "결제금액", "결제일", "연락처"],
        );

        let outcome = normalize(
            &mapping,
            "org-1",
            &[record(
                1,
                &["사과", "1", "홍길동", "₩12,345.5", "2026-03-01 08:30", "010-1234-5678"],
            )],
            0,
        );
        let draft = &outcome.rows[0].draft;
        assert_eq!(draft.paid_amount, Some(dec!(12346)));
        assert_eq!(draft.recipient_phone.as_deref(), Some("01012345678"));

        // KST 08:30 = UTC 전날 23:30
        let paid = draft.payment_date.unwrap();
        assert_eq!(paid.day(), 28);
        assert_eq!(paid.hour(), 23);
        assert_eq!(paid.minute(), 30);
    }

    #[test]
    fn test_malformed_optional_value_rejects_row() {
        let mut rules = basic_rules();
        rules.push(ExtractionRule::new(CanonicalField::PaymentDate, "결제일"));
        let mapping = mapping(rules, &["옵션명", "수량", "수취인", "결제일"]);
        let outcome = normalize(
            &mapping,
            "org-1",
            &[record(1, &["사과", "1", "홍길동", "03/01/2026"])],
            0,
        );
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].errors[0].field, CanonicalField::PaymentDate);
    }

    #[test]
    fn test_shipping_status_mapping() {
        let mut rules = basic_rules();
        rules.push(ExtractionRule::new(CanonicalField::ShippingStatus, "배송상태"));
        let mapping = mapping(rules, &["옵션명", "수량", "수취인", "배송상태"]);
        let outcome = normalize(
            &mapping,
            "org-1",
            &[
                record(1, &["사과", "1", "홍길동", "배송완료"]),
                record(2, &["사과", "1", "홍길동", "보류"]),
            ],
            0,
        );
        assert_eq!(outcome.rows[0].draft.shipping_status, ShippingStatus::Delivered);
        assert_eq!(outcome.rows[1].draft.shipping_status, ShippingStatus::Received);
        assert_eq!(outcome.rows[1].warnings.len(), 1);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mapping = mapping(basic_rules(), &["옵션명", "수량", "수취인"]);
        let records = vec![
            record(1, &["사과 1kg", "3", "홍길동"]),
            record(2, &["", "1", "김철수"]),
        ];
        let first = normalize(&mapping, "org-1", &records, 0);
        let second = normalize(&mapping, "org-1", &records, 0);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_datetime("2026-03-01", "%Y-%m-%d", 540).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-02-28T15:00:00+00:00");
    }
}
