//! PostgreSQL 仓储集成测试
//!
//! 结算单 (组织, 日期) 唯一约束与确认状态的条件更新只能在真实数据库上验证。
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test --test pg_repository_test -- --ignored
//! ```

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use order_pipeline::models::{
    CanonicalOrder, CanonicalOrderDraft, EnrichmentStatus, OrderEnrichment, SettlementRecord,
    SettlementStatus, ShippingStatus,
};
use order_pipeline::repository::{
    OrderRepository, OrderRepositoryTrait, SettlementRepository, SettlementRepositoryTrait,
};

// ==================== 辅助函数 ====================

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = PgPool::connect(&url).await.expect("数据库连接失败");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("执行迁移失败");
    pool
}

fn unique_org() -> String {
    format!("org-{}", Uuid::new_v4())
}

fn order(org: &str, quantity: i32, status: ShippingStatus) -> CanonicalOrder {
    let paid_at = Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap();
    let draft = CanonicalOrderDraft {
        organization_id: org.to_string(),
        marketplace: "coupang".to_string(),
        batch_id: Uuid::new_v4(),
        row_number: 1,
        profile_version: 1,
        seller_order_number: Some("A-1".to_string()),
        option_name: "사과 1kg".to_string(),
        option_code: None,
        quantity,
        recipient_name: Some("홍길동".to_string()),
        recipient_phone: None,
        recipient_address: None,
        shipping_status: status,
        paid_amount: None,
        sheet_date: None,
        payment_date: Some(paid_at),
    };
    let enrichment = OrderEnrichment {
        status: EnrichmentStatus::Resolved,
        catalog_entry_id: Some(Uuid::new_v4()),
        matched_option_name: Some("사과 1kg".to_string()),
        supply_price: Some(dec!(5000)),
        discount_rate: Some(dec!(0.03)),
        settlement_amount: Some(dec!(4850) * rust_decimal::Decimal::from(quantity)),
        ..Default::default()
    };
    CanonicalOrder::from_draft(Uuid::new_v4(), draft, enrichment, Utc::now())
}

fn draft_record(org: &str, date: NaiveDate, net: rust_decimal::Decimal) -> SettlementRecord {
    let now = Utc::now();
    SettlementRecord {
        id: Uuid::new_v4(),
        organization_id: org.to_string(),
        settlement_date: date,
        order_count: 1,
        cancelled_count: 0,
        refunded_count: 0,
        unresolved_count: 0,
        total_quantity: 1,
        gross_amount: net,
        discount_total: dec!(0),
        net_amount: net,
        discount_rate: dec!(0),
        tier_name: None,
        status: SettlementStatus::Draft,
        source_digest: "digest".to_string(),
        confirmed_by: None,
        confirmed_at: None,
        reopened_by: None,
        reopened_at: None,
        reopen_reason: None,
        created_at: now,
        updated_at: now,
    }
}

// ==================== 测试 ====================

#[tokio::test]
#[ignore]
async fn test_order_volume_and_soft_delete() {
    let pool = pool().await;
    let repo = OrderRepository::new(pool);
    let org = unique_org();

    let billable = order(&org, 2, ShippingStatus::Delivered);
    let cancelled = order(&org, 1, ShippingStatus::Cancelled);
    let inserted = repo
        .insert_orders(&[billable.clone(), cancelled.clone()])
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let since = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let volume = repo.order_volume(&org, since).await.unwrap();
    assert_eq!(volume.order_count, 1);
    assert_eq!(volume.total_sales, dec!(10000));

    let from = Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap();
    let listed = repo
        .list_for_settlement(&org, from, from + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);

    assert!(!repo.purge_order(billable.id).await.unwrap());
    let deleted = repo
        .set_deleted(billable.id, true, Some("admin"), Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(deleted.deleted_by.as_deref(), Some("admin"));

    let listed = repo
        .list_for_settlement(&org, from, from + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(repo.purge_order(billable.id).await.unwrap());
    assert!(repo.get_order(billable.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_confirmed_settlement_not_overwritten() {
    let pool = pool().await;
    let repo = SettlementRepository::new(pool);
    let org = unique_org();
    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

    let first = draft_record(&org, date, dec!(14550));
    assert!(repo.upsert_draft(&first).await.unwrap());

    // 同一 (组织, 日期) 再次写入时保留原 ID
    let second = draft_record(&org, date, dec!(9700));
    assert!(repo.upsert_draft(&second).await.unwrap());
    let stored = repo.find_by_key(&org, date).await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.net_amount, dec!(9700));

    let confirmed = repo
        .mark_confirmed(stored.id, "finance", Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed.status, SettlementStatus::Confirmed);
    assert!(repo.mark_confirmed(stored.id, "finance", Utc::now()).await.unwrap().is_none());

    assert!(!repo.upsert_draft(&draft_record(&org, date, dec!(1))).await.unwrap());
    let unchanged = repo.get_settlement(stored.id).await.unwrap().unwrap();
    assert_eq!(unchanged.net_amount, dec!(9700));

    let reopened = repo
        .mark_reopened(stored.id, "auditor", "환불 누락", Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reopened.status, SettlementStatus::Draft);
    assert_eq!(reopened.confirmed_by.as_deref(), Some("finance"));
    assert_eq!(reopened.reopened_by.as_deref(), Some("auditor"));
    assert_eq!(reopened.reopen_reason.as_deref(), Some("환불 누락"));

    let listed = repo
        .list_range(Some(&org), date, date)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}
