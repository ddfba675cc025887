//! 账本枚举类型定义

use serde::{Deserialize, Serialize};

/// 流水类型
///
/// 每次余额变动都对应一条流水，流水写入后不可修改
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// 运营发放
    Grant,
    /// 计量消耗
    Consume,
    /// 撤销冲正（余额不足时被拒绝）
    Reversal,
    /// 强制冲正（审计通道，允许余额为负）
    ForcedReversal,
    /// 每日补充
    DailyRefill,
}

impl TransactionKind {
    /// 是否为冲正流水
    pub fn is_reversal(&self) -> bool {
        matches!(self, Self::Reversal | Self::ForcedReversal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "GRANT",
            Self::Consume => "CONSUME",
            Self::Reversal => "REVERSAL",
            Self::ForcedReversal => "FORCED_REVERSAL",
            Self::DailyRefill => "DAILY_REFILL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&TransactionKind::ForcedReversal).unwrap();
        assert_eq!(json, "\"FORCED_REVERSAL\"");
        assert!(TransactionKind::Reversal.is_reversal());
        assert!(!TransactionKind::DailyRefill.is_reversal());
    }
}
