//! 定点金额运算
//!
//! 所有金额均使用 `rust_decimal::Decimal`，禁止经过二进制浮点。
//! 舍入统一为四舍五入（远离零方向），精度由调用方传入的最小单位位数决定。

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Result, SharedError};

/// 按最小单位精度四舍五入
pub fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// 解析导出表格中的金额文本
///
/// 接受千分位逗号、`₩` 前缀和 `원` 后缀，负数与空字符串视为无效。
pub fn parse_amount(raw: &str, scale: u32) -> Result<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('₩')
        .trim_end_matches('원')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(SharedError::InvalidAmount(raw.to_string()));
    }

    let value = Decimal::from_str(&cleaned)
        .map_err(|_| SharedError::InvalidAmount(raw.to_string()))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(SharedError::InvalidAmount(raw.to_string()));
    }

    Ok(round_half_up(value, scale))
}

/// 折扣率须落在 [0, 1) 区间
pub fn is_valid_rate(rate: Decimal) -> bool {
    rate >= Decimal::ZERO && rate < Decimal::ONE
}
