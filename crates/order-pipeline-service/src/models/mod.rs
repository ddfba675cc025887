//! 订单流水线领域模型

pub mod catalog;
pub mod enums;
pub mod mapping;
pub mod order;
pub mod settlement;
pub mod tier;

pub use catalog::{OptionAlias, OptionCatalogEntry};
pub use enums::{
    CanonicalField, CatalogStatus, EnrichmentStatus, SettlementStatus, ShippingStatus, TierSource,
};
pub use mapping::{ColumnBinding, ExtractionRule, MappingProfile, RawBatch, RawOrderRecord};
pub use order::{
    CanonicalOrder, CanonicalOrderDraft, FieldError, FieldWarning, OrderEnrichment, OrderVolume,
    RowRejection,
};
pub use settlement::{MonthlySettlement, SettlementRecord, SettlementSummary};
pub use tier::{ManualTierOverride, TierAssignment, TierCriterion};
