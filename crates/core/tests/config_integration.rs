//! sqlsentinel.toml 통합 설정 테스트
//!
//! - sqlsentinel.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트 (기존 배포 이름 포함)
//! - 빈 파일 / 잘못된 형식 에러 테스트

use sqlsentinel_core::config::SentinelConfig;
use sqlsentinel_core::error::{ConfigError, SentinelError};

// =============================================================================
// sqlsentinel.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../sqlsentinel.toml.example");
    let config = SentinelConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.dedup.table_name, "SlackNotifierDDB");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../sqlsentinel.toml.example");
    let config = SentinelConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../sqlsentinel.toml.example");
    let example = SentinelConfig::parse(content).expect("should parse");
    let defaults = SentinelConfig::default();

    assert_eq!(example.decoder.max_decoded_bytes, defaults.decoder.max_decoded_bytes);
    assert_eq!(
        example.assembler.max_lines_per_record,
        defaults.assembler.max_lines_per_record
    );
    assert_eq!(example.filter.noise_patterns, defaults.filter.noise_patterns);
    assert_eq!(example.filter.min_severity, defaults.filter.min_severity);
    assert_eq!(example.dedup.cooldown_minutes, defaults.dedup.cooldown_minutes);
    assert_eq!(example.dedup.ttl_hours, defaults.dedup.ttl_hours);
    assert_eq!(
        example.dedup.store_failure_policy,
        defaults.dedup.store_failure_policy
    );
    assert_eq!(example.dedup.dispatch_order, defaults.dedup.dispatch_order);
    assert_eq!(example.notifier.max_attempts, defaults.notifier.max_attempts);
    assert_eq!(example.notifier.retry_delay_ms, defaults.notifier.retry_delay_ms);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_notifier_only() {
    let toml = r#"
[notifier]
webhook_url = "https://hooks.example.com/services/T000/B000/XXX"
max_attempts = 3
"#;
    let config = SentinelConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(
        config.notifier.webhook_url,
        "https://hooks.example.com/services/T000/B000/XXX"
    );
    assert_eq!(config.notifier.max_attempts, 3);
    assert_eq!(config.notifier.timeout_secs, 10);
    assert_eq!(config.dedup.cooldown_minutes, 15);
}

#[test]
fn partial_config_filter_replaces_noise_patterns() {
    let toml = r#"
[filter]
ignored_error_numbers = [5701, 5703]
noise_patterns = ["Recovery is writing a checkpoint"]
"#;
    let config = SentinelConfig::parse(toml).expect("should parse");
    assert_eq!(config.filter.ignored_error_numbers, vec![5701, 5703]);
    assert_eq!(
        config.filter.noise_patterns,
        vec!["Recovery is writing a checkpoint"]
    );
}

#[test]
fn invalid_value_type_is_parse_error() {
    let toml = r#"
[dedup]
cooldown_minutes = "fifteen"
"#;
    let err = SentinelConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        SentinelError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn from_file_reads_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sqlsentinel.toml");
    tokio::fs::write(&path, "[dedup]\nttl_hours = 48\n")
        .await
        .expect("write config");

    let config = SentinelConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.dedup.ttl_hours, 48);
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sqlsentinel.toml");
    tokio::fs::write(&path, "[general]\nlog_format = \"xml\"\n")
        .await
        .expect("write config");

    let err = SentinelConfig::from_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("general.log_format"));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    let originals: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(k, _)| ((*k).to_owned(), std::env::var(k).ok()))
        .collect();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        for (k, original) in originals {
            match original {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[dedup]
cooldown_minutes = 5
"#;
    let cooldown = with_env(&[("SQLSENTINEL_DEDUP_COOLDOWN_MINUTES", "45")], || {
        let mut config = SentinelConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.dedup.cooldown_minutes
    });
    assert_eq!(cooldown, 45);
}

#[test]
#[serial_test::serial]
fn legacy_env_names_are_recognized() {
    let config = with_env(
        &[
            ("SLACK_WEBHOOK_URL", "https://hooks.example.com/legacy"),
            ("DYNAMODB_TABLE_NAME", "LegacyTable"),
            ("NOTIFICATION_COOLDOWN_MINUTES", "20"),
            ("TTL_HOURS", "48"),
        ],
        || {
            let mut config = SentinelConfig::default();
            config.apply_env_overrides();
            config
        },
    );
    assert_eq!(config.notifier.webhook_url, "https://hooks.example.com/legacy");
    assert_eq!(config.dedup.table_name, "LegacyTable");
    assert_eq!(config.dedup.cooldown_minutes, 20);
    assert_eq!(config.dedup.ttl_hours, 48);
}

#[test]
#[serial_test::serial]
fn prefixed_env_wins_over_legacy_name() {
    let ttl = with_env(
        &[("TTL_HOURS", "48"), ("SQLSENTINEL_DEDUP_TTL_HOURS", "72")],
        || {
            let mut config = SentinelConfig::default();
            config.apply_env_overrides();
            config.dedup.ttl_hours
        },
    );
    assert_eq!(ttl, 72);
}

#[test]
#[serial_test::serial]
fn from_env_validates_result() {
    let result = with_env(&[("SQLSENTINEL_DEDUP_BACKEND", "redis")], SentinelConfig::from_env);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("dedup.backend"));
}
