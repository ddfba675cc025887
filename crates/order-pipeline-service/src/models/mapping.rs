//! 映射配置与原始订单行

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CanonicalField;

/// 列绑定
///
/// 优先按列名绑定；按列序号绑定只有在 `index_fallback` 显式开启时才生效，
/// 平台调整导出格式后序号绑定会静默错位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnBinding {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub index_fallback: bool,
}

impl ColumnBinding {
    pub fn by_name(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            index: None,
            index_fallback: false,
        }
    }

    /// 列名找不到时退回到列序号
    pub fn with_index_fallback(mut self, index: usize) -> Self {
        self.index = Some(index);
        self.index_fallback = true;
        self
    }

    /// 用于日志和错误信息的描述
    pub fn describe(&self) -> String {
        match (&self.column, self.index) {
            (Some(column), Some(index)) => format!("{} (#{})", column, index),
            (Some(column), None) => column.clone(),
            (None, Some(index)) => format!("#{}", index),
            (None, None) => "<unbound>".to_string(),
        }
    }
}

/// 字段提取规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRule {
    pub field: CanonicalField,
    pub source: ColumnBinding,
    /// 值为空时使用的默认值（必填字段忽略此项）
    #[serde(default)]
    pub default: Option<String>,
    /// 转换函数 ID：trim / digits_only / uppercase / collapse_whitespace
    #[serde(default)]
    pub transform: Option<String>,
}

impl ExtractionRule {
    pub fn new(field: CanonicalField, column: impl Into<String>) -> Self {
        Self {
            field,
            source: ColumnBinding::by_name(column),
            default: None,
            transform: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn with_index_fallback(mut self, index: usize) -> Self {
        self.source = self.source.with_index_fallback(index);
        self
    }
}

/// 平台映射配置
///
/// 同一平台同一时刻只允许一个启用的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MappingProfile {
    pub id: Uuid,
    pub marketplace: String,
    pub version: i32,
    pub active: bool,
    #[sqlx(json)]
    pub rules: Vec<ExtractionRule>,
    /// 表头中同时出现这些文本时识别为该平台
    pub detect_strings: Vec<String>,
    /// 表头所在行（从 0 开始），之前的行为说明文字
    pub header_row: i32,
    /// 日期格式（chrono 格式串），只有日期时按当日零点处理
    pub date_format: String,
    /// 导出时间所在时区相对 UTC 的偏移（分钟）
    pub utc_offset_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

impl MappingProfile {
    /// 从原始表格中切出表头和数据行
    pub fn split_sheet(&self, sheet: Vec<Vec<String>>) -> Option<(Vec<String>, Vec<Vec<String>>)> {
        let header_row = usize::try_from(self.header_row).ok()?;
        let mut rows = sheet.into_iter().skip(header_row);
        let header = rows.next()?;
        Some((header, rows.collect()))
    }

    /// 表头是否包含全部识别文本
    pub fn matches_header(&self, header: &[String]) -> bool {
        !self.detect_strings.is_empty()
            && self
                .detect_strings
                .iter()
                .all(|needle| header.iter().any(|h| h.trim() == needle.trim()))
    }
}

/// 原始订单行
///
/// 单元格按表头顺序排列，列名到值的映射由解析后的映射配置给出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderRecord {
    pub batch_id: Uuid,
    pub marketplace: String,
    /// 数据行序号（从 1 开始，不含表头）
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl RawOrderRecord {
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }
}

/// 一次上传的原始批次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBatch {
    pub batch_id: Uuid,
    pub organization_id: String,
    pub marketplace: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawBatch {
    /// 展开为原始订单行，跳过全空行
    pub fn records(&self) -> Vec<RawOrderRecord> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|(i, row)| RawOrderRecord {
                batch_id: self.batch_id,
                marketplace: self.marketplace.clone(),
                row_number: i + 1,
                cells: row.clone(),
            })
            .collect()
    }
}
