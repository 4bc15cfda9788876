//! Configuration loading integration tests
//!
//! Files are written with `tempfile` and loaded the way the binary loads them.

#[cfg(test)]
mod tests {
    use crate::assert_err;
    use crate::common::fixtures::test_catalog;
    use llmgateway_core::core::keys::CredentialEnv;
    use llmgateway_core::{Config, GatewayError, RoutingCore};
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_full_config_file() {
        let file = write_config(
            r#"
router:
  max_retries: 1
  exploration_rate: 0.05
  metrics_window_minutes: 15
  upstream_timeout_secs: 30
  defaults:
    uptime: 95.0
    latency_ms: 800.0
    throughput: 40.0
keys:
  degraded_error_threshold: 3
  error_window_secs: 60
cost:
  data_storage_cost_per_million_tokens: "0.01"
  discount_cache_ttl_secs: 10
log_queue:
  buffer_size: 64
"#,
        );

        let config = Config::from_file(file.path()).await.unwrap();
        assert_eq!(config.router.max_retries, 1);
        assert_eq!(config.router.exploration_rate, 0.05);
        assert_eq!(config.router.metrics_window_minutes, 15);
        assert_eq!(config.router.upstream_timeout_secs, 30);
        assert_eq!(config.router.defaults.uptime, 95.0);
        assert_eq!(config.keys.degraded_error_threshold, 3);
        assert_eq!(config.cost.data_storage_cost_per_million_tokens, dec!(0.01));
        assert_eq!(config.cost.discount_cache_ttl_secs, 10);
        assert_eq!(config.log_queue.buffer_size, 64);

        let core = RoutingCore::builder(config)
            .catalog(test_catalog())
            .credentials(CredentialEnv::new())
            .build()
            .unwrap();
        assert_eq!(core.config().router.max_retries, 1);
        assert_eq!(core.key_pool().config().degraded_error_threshold, 3);
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_file_uses_defaults() {
        let file = write_config("{}\n");
        let config = Config::from_file(file.path()).await.unwrap();
        assert_eq!(config.router.max_retries, 2);
        assert_eq!(config.router.upstream_timeout_secs, 600);
        assert_eq!(config.logging.level, Config::default().logging.level);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = assert_err!(Config::from_file(dir.path().join("absent.yaml")).await);
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_values_rejected() {
        for yaml in [
            "router:\n  exploration_rate: 1.5\n",
            "router:\n  upstream_timeout_secs: 0\n",
            "keys:\n  degraded_error_threshold: 0\n",
            "log_queue:\n  buffer_size: 0\n",
        ] {
            let file = write_config(yaml);
            let err = assert_err!(Config::from_file(file.path()).await);
            assert!(matches!(err, GatewayError::Config(_)), "accepted: {}", yaml);
        }
    }

    #[tokio::test]
    async fn test_builder_validates_config() {
        let mut config = Config::default();
        config.router.weights.price = 0.9;

        let err = assert_err!(RoutingCore::builder(config).credentials(CredentialEnv::new()).build());
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
