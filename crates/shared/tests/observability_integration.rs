//! 可观测性模块集成测试
//!
//! 未安装全局 recorder 时记录指标不应 panic

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use order_shared::observability::metrics::{
        get_handle, record_enrichment, record_http_request, record_ingestion,
        record_ledger_operation, record_settlement_upsert,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/settlements", 200, 0.05);
        record_http_request("POST", "/api/ingestion/batches", 200, 0.12);
        record_http_request("GET", "/api/orders/{id}", 404, 0.01);
        record_http_request("POST", "/api/credits/grant", 500, 0.25);
    }

    #[test]
    fn test_record_pipeline_metrics() {
        record_ingestion("coupang", 120, 3, 0.8);
        record_ingestion("smartstore", 0, 0, 0.0);
        record_enrichment("resolved");
        record_enrichment("unresolved");
        record_enrichment("duplicate");
        record_settlement_upsert("created");
        record_settlement_upsert("unchanged");
    }

    #[test]
    fn test_record_ledger_operation() {
        record_ledger_operation("grant", "success", 0.01);
        record_ledger_operation("revoke", "insufficient_balance", 0.02);
        record_ledger_operation("refill", "replayed", 0.0);
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        record_http_request("GET", "", 0, 0.0);
        record_ingestion("", usize::MAX, 0, f64::MAX);
        record_ledger_operation("grant", "success", -1.0);
    }

    #[test]
    fn test_handle_absent_without_init() {
        assert!(get_handle().is_none());
    }
}

// ============================================================================
// 中间件测试
// ============================================================================

mod middleware_tests {
    use order_shared::observability::middleware::RequestId;

    #[test]
    fn test_request_id_creation() {
        let id = RequestId("req-123".to_string());
        assert_eq!(id.as_str(), "req-123");
    }

    #[test]
    fn test_request_id_clone() {
        let id = RequestId("req-456".to_string());
        let cloned = id.clone();
        assert_eq!(id.as_str(), cloned.as_str());
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use order_shared::observability::ObservabilityConfig;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(config.metrics_enabled);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_with_service_name_fills_default_only() {
        let config = ObservabilityConfig::default().with_service_name("order-pipeline-service");
        assert_eq!(config.service_name, "order-pipeline-service");

        let named = ObservabilityConfig {
            service_name: "custom".to_string(),
            ..Default::default()
        };
        assert_eq!(named.with_service_name("credit-ledger-service").service_name, "custom");
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use order_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}
