//! 字段转换函数

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("空白匹配正则固定合法"));

/// 映射规则可引用的转换函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    Trim,
    /// 只保留数字（电话号码）
    DigitsOnly,
    Uppercase,
    /// 连续空白压缩为一个空格
    CollapseWhitespace,
}

impl FieldTransform {
    /// 按 ID 查找转换函数，未知 ID 返回 `None`
    pub fn parse(id: &str) -> Option<Self> {
        match id.trim() {
            "trim" => Some(Self::Trim),
            "digits_only" => Some(Self::DigitsOnly),
            "uppercase" => Some(Self::Uppercase),
            "collapse_whitespace" => Some(Self::CollapseWhitespace),
            _ => None,
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Trim => value.trim().to_string(),
            Self::DigitsOnly => value.chars().filter(char::is_ascii_digit).collect(),
            Self::Uppercase => value.trim().to_uppercase(),
            Self::CollapseWhitespace => WHITESPACE.replace_all(value.trim(), " ").into_owned(),
        }
    }
}
