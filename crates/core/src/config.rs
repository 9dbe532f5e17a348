//! 설정 관리 -- sqlsentinel.toml 파싱 및 런타임 설정
//!
//! [`SentinelConfig`]는 모든 단계의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SQLSENTINEL_DEDUP_COOLDOWN_MINUTES=30` 형식, 배포 스크립트의
//!    `SLACK_WEBHOOK_URL` 등 기존 이름도 인식)
//! 3. 설정 파일 (`sqlsentinel.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sqlsentinel_core::error::SentinelError> {
//! use sqlsentinel_core::config::SentinelConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SentinelConfig::load("sqlsentinel.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SentinelConfig::parse("[dedup]\ncooldown_minutes = 30")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SentinelError};

/// sqlsentinel 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 배치 디코더 설정
    #[serde(default)]
    pub decoder: DecoderConfig,
    /// 멀티라인 조립기 설정
    #[serde(default)]
    pub assembler: AssemblerConfig,
    /// 노이즈 필터 설정
    #[serde(default)]
    pub filter: FilterConfig,
    /// 중복 제거 저장소 설정
    #[serde(default)]
    pub dedup: DedupConfig,
    /// 웹훅 알림 설정
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl SentinelConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SentinelError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 없이 기본값 + 환경변수만으로 설정을 구성합니다.
    ///
    /// 함수 실행 환경처럼 설정 파일이 없는 배포에서 사용합니다.
    pub fn from_env() -> Result<Self, SentinelError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SentinelError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SentinelError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SentinelError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SentinelError> {
        toml::from_str(toml_str).map_err(|e| {
            SentinelError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SQLSENTINEL_{SECTION}_{FIELD}`
    /// 예: `SQLSENTINEL_NOTIFIER_WEBHOOK_URL=https://hooks.slack.com/...`
    ///
    /// 기존 배포 이름(`SLACK_WEBHOOK_URL`, `DYNAMODB_TABLE_NAME`,
    /// `NOTIFICATION_COOLDOWN_MINUTES`, `TTL_HOURS`)은 먼저 적용되고,
    /// 같은 필드의 `SQLSENTINEL_*` 값이 있으면 그것이 우선합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SQLSENTINEL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SQLSENTINEL_GENERAL_LOG_FORMAT");

        // Decoder / Assembler
        override_usize(
            &mut self.decoder.max_decoded_bytes,
            "SQLSENTINEL_DECODER_MAX_DECODED_BYTES",
        );
        override_usize(
            &mut self.assembler.max_lines_per_record,
            "SQLSENTINEL_ASSEMBLER_MAX_LINES_PER_RECORD",
        );

        // Filter
        override_u32_csv(
            &mut self.filter.ignored_error_numbers,
            "SQLSENTINEL_FILTER_IGNORED_ERROR_NUMBERS",
        );
        override_opt_u8(&mut self.filter.min_severity, "SQLSENTINEL_FILTER_MIN_SEVERITY");

        // Dedup
        override_string(&mut self.dedup.table_name, "DYNAMODB_TABLE_NAME");
        override_string(&mut self.dedup.table_name, "SQLSENTINEL_DEDUP_TABLE_NAME");
        override_string(&mut self.dedup.backend, "SQLSENTINEL_DEDUP_BACKEND");
        override_string(&mut self.dedup.data_dir, "SQLSENTINEL_DEDUP_DATA_DIR");
        override_u32(&mut self.dedup.cooldown_minutes, "NOTIFICATION_COOLDOWN_MINUTES");
        override_u32(
            &mut self.dedup.cooldown_minutes,
            "SQLSENTINEL_DEDUP_COOLDOWN_MINUTES",
        );
        override_u32(&mut self.dedup.ttl_hours, "TTL_HOURS");
        override_u32(&mut self.dedup.ttl_hours, "SQLSENTINEL_DEDUP_TTL_HOURS");
        override_string(
            &mut self.dedup.store_failure_policy,
            "SQLSENTINEL_DEDUP_STORE_FAILURE_POLICY",
        );
        override_string(
            &mut self.dedup.dispatch_order,
            "SQLSENTINEL_DEDUP_DISPATCH_ORDER",
        );

        // Notifier
        override_string(&mut self.notifier.webhook_url, "SLACK_WEBHOOK_URL");
        override_string(
            &mut self.notifier.webhook_url,
            "SQLSENTINEL_NOTIFIER_WEBHOOK_URL",
        );
        override_u64(
            &mut self.notifier.timeout_secs,
            "SQLSENTINEL_NOTIFIER_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.notifier.max_attempts,
            "SQLSENTINEL_NOTIFIER_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.notifier.retry_delay_ms,
            "SQLSENTINEL_NOTIFIER_RETRY_DELAY_MS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SentinelError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.decoder.max_decoded_bytes == 0 {
            return Err(invalid("decoder.max_decoded_bytes", "must be greater than 0"));
        }

        if self.assembler.max_lines_per_record == 0 {
            return Err(invalid(
                "assembler.max_lines_per_record",
                "must be greater than 0",
            ));
        }

        // 노이즈 패턴은 정규식으로 컴파일 가능해야 함
        for (idx, pattern) in self.filter.noise_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(invalid(
                    "filter.noise_patterns",
                    format!("pattern[{idx}] is not a valid regex: {e}"),
                ));
            }
        }

        if let Some(sev) = self.filter.min_severity
            && sev > 25
        {
            return Err(invalid("filter.min_severity", "must be between 0 and 25"));
        }

        // dedup 검증
        let valid_backends = ["file", "memory"];
        if !valid_backends.contains(&self.dedup.backend.as_str()) {
            return Err(invalid(
                "dedup.backend",
                format!("must be one of: {}", valid_backends.join(", ")),
            ));
        }

        if self.dedup.table_name.trim().is_empty() {
            return Err(invalid("dedup.table_name", "must not be empty"));
        }

        if self.dedup.cooldown_minutes == 0 {
            return Err(invalid("dedup.cooldown_minutes", "must be greater than 0"));
        }

        if self.dedup.ttl_hours == 0 {
            return Err(invalid("dedup.ttl_hours", "must be greater than 0"));
        }

        // 쿨다운 도중 엔트리가 만료되면 쿨다운이 TTL로 줄어듦
        if u64::from(self.dedup.ttl_hours) * 60 < u64::from(self.dedup.cooldown_minutes) {
            return Err(invalid(
                "dedup.ttl_hours",
                format!(
                    "{}h retention is shorter than the {}m cooldown",
                    self.dedup.ttl_hours, self.dedup.cooldown_minutes
                ),
            ));
        }

        let valid_policies = ["fail_open", "fail_closed"];
        if !valid_policies.contains(&self.dedup.store_failure_policy.as_str()) {
            return Err(invalid(
                "dedup.store_failure_policy",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }

        let valid_orders = ["write_then_notify", "notify_then_write"];
        if !valid_orders.contains(&self.dedup.dispatch_order.as_str()) {
            return Err(invalid(
                "dedup.dispatch_order",
                format!("must be one of: {}", valid_orders.join(", ")),
            ));
        }

        // notifier 검증 (빈 URL은 허용: 검증 전용 실행 등)
        if !self.notifier.webhook_url.is_empty()
            && !(self.notifier.webhook_url.starts_with("https://")
                || self.notifier.webhook_url.starts_with("http://"))
        {
            return Err(invalid(
                "notifier.webhook_url",
                "must start with http:// or https://",
            ));
        }

        if self.notifier.max_attempts == 0 {
            return Err(invalid("notifier.max_attempts", "must be at least 1"));
        }

        if self.notifier.timeout_secs == 0 {
            return Err(invalid("notifier.timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SentinelError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 배치 디코더 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// 압축 해제 후 허용되는 최대 크기 (바이트)
    pub max_decoded_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_decoded_bytes: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// 멀티라인 조립기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// 레코드 하나에 붙일 수 있는 최대 라인 수
    pub max_lines_per_record: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_lines_per_record: 16,
        }
    }
}

/// 노이즈 필터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 내장 목록에 추가로 무시할 에러 번호
    pub ignored_error_numbers: Vec<u32>,
    /// 최소 심각도 (이보다 낮으면 제거, 없으면 비활성)
    pub min_severity: Option<u8>,
    /// 정보성 메시지 패턴 (대소문자 무시 정규식)
    pub noise_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignored_error_numbers: Vec::new(),
            min_severity: None,
            noise_patterns: DEFAULT_NOISE_PATTERNS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
        }
    }
}

/// 기본 정보성 메시지 패턴
pub const DEFAULT_NOISE_PATTERNS: &[&str] = &[
    "Attempting to cycle error log",
    "Logging SQL Server messages in file",
    "DBCC CHECKDB .* found 0 errors and repaired 0 errors",
    "This is an informational message only",
    "The error log has been reinitialized",
    "The last error 0 was within the time threshold for the duplicate count",
    r"DBCC execution completed\. If DBCC printed error messages, contact your system administrator\.",
    "DBCC STDOUT:",
    "DBCC STDERR:",
    "DBCC has extra input",
    "DBCC is not currently processing any command",
];

/// 중복 제거 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// 저장소 백엔드 (file, memory)
    pub backend: String,
    /// 테이블(컬렉션) 이름
    pub table_name: String,
    /// file 백엔드 데이터 디렉토리
    pub data_dir: String,
    /// 쿨다운 (분)
    pub cooldown_minutes: u32,
    /// 엔트리 보존 시간 (시간)
    pub ttl_hours: u32,
    /// 저장소 조회 실패 시 정책 (fail_open, fail_closed)
    pub store_failure_policy: String,
    /// 기록과 전송 순서 (write_then_notify, notify_then_write)
    pub dispatch_order: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_owned(),
            table_name: "SlackNotifierDDB".to_owned(),
            data_dir: "/tmp/sqlsentinel".to_owned(),
            cooldown_minutes: 15,
            ttl_hours: 10,
            store_failure_policy: "fail_open".to_owned(),
            dispatch_order: "write_then_notify".to_owned(),
        }
    }
}

/// 웹훅 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 알림 웹훅 URL
    pub webhook_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 최대 전송 시도 횟수 (2 = 1회 재시도)
    pub max_attempts: u32,
    /// 재시도 전 대기 (밀리초)
    pub retry_delay_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            timeout_secs: 10,
            max_attempts: 2,
            retry_delay_ms: 500,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_opt_u8(target: &mut Option<u8>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        if val.trim().is_empty() {
            *target = None;
            return;
        }
        match val.trim().parse::<u8>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u8 from env var, ignoring"
            ),
        }
    }
}

fn override_u32_csv(target: &mut Vec<u32>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let parsed: Result<Vec<u32>, _> = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<u32>)
            .collect();
        match parsed {
            Ok(numbers) => *target = numbers,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 list from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = SentinelConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.dedup.cooldown_minutes, 15);
        assert_eq!(config.dedup.ttl_hours, 10);
        assert_eq!(config.dedup.table_name, "SlackNotifierDDB");
        assert_eq!(config.notifier.max_attempts, 2);
        assert_eq!(config.filter.noise_patterns.len(), DEFAULT_NOISE_PATTERNS.len());
    }

    #[test]
    fn default_config_passes_validation() {
        SentinelConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = SentinelConfig::parse("").unwrap();
        assert_eq!(config.dedup.cooldown_minutes, 15);
        assert_eq!(config.decoder.max_decoded_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let config = SentinelConfig::parse(
            r#"
[dedup]
cooldown_minutes = 30

[filter]
min_severity = 16
"#,
        )
        .unwrap();
        assert_eq!(config.dedup.cooldown_minutes, 30);
        assert_eq!(config.dedup.ttl_hours, 10);
        assert_eq!(config.filter.min_severity, Some(16));
        assert_eq!(config.general.log_format, "json");
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = SentinelConfig::parse("[dedup\ncooldown_minutes = ");
        assert!(matches!(
            result,
            Err(SentinelError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn validate_rejects_zero_cooldown() {
        let mut config = SentinelConfig::default();
        config.dedup.cooldown_minutes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dedup.cooldown_minutes"));
    }

    #[test]
    fn validate_rejects_zero_ttl() {
        let mut config = SentinelConfig::default();
        config.dedup.ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_retention_shorter_than_cooldown() {
        let mut config = SentinelConfig::default();
        config.dedup.cooldown_minutes = 120;
        config.dedup.ttl_hours = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dedup.ttl_hours"));

        config.dedup.ttl_hours = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_invalid_noise_regex() {
        let mut config = SentinelConfig::default();
        config.filter.noise_patterns.push("unclosed (group".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("filter.noise_patterns"));
    }

    #[test]
    fn validate_rejects_unknown_policy() {
        let mut config = SentinelConfig::default();
        config.dedup.store_failure_policy = "maybe".to_owned();
        assert!(config.validate().is_err());

        let mut config = SentinelConfig::default();
        config.dedup.dispatch_order = "whenever".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_http_webhook() {
        let mut config = SentinelConfig::default();
        config.notifier.webhook_url = "ftp://example.com/hook".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("notifier.webhook_url"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = SentinelConfig::default();
        config.notifier.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_severity_floor() {
        let mut config = SentinelConfig::default();
        config.filter.min_severity = Some(30);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_SQLSENTINEL_STR", "overridden") };
        override_string(&mut val, "TEST_SQLSENTINEL_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_SQLSENTINEL_STR") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_u32_invalid_keeps_original() {
        let mut val = 15;
        // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_SQLSENTINEL_U32_BAD", "fifteen") };
        override_u32(&mut val, "TEST_SQLSENTINEL_U32_BAD");
        assert_eq!(val, 15);
        unsafe { std::env::remove_var("TEST_SQLSENTINEL_U32_BAD") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_u32_csv() {
        let mut val = vec![1];
        // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_SQLSENTINEL_CSV", "5701, 5703,,8153") };
        override_u32_csv(&mut val, "TEST_SQLSENTINEL_CSV");
        assert_eq!(val, vec![5701, 5703, 8153]);
        unsafe { std::env::remove_var("TEST_SQLSENTINEL_CSV") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_opt_u8_empty_clears() {
        let mut val = Some(10);
        // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_SQLSENTINEL_OPT", "") };
        override_opt_u8(&mut val, "TEST_SQLSENTINEL_OPT");
        assert_eq!(val, None);
        unsafe { std::env::remove_var("TEST_SQLSENTINEL_OPT") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_SQLSENTINEL_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = SentinelConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = SentinelConfig::parse(&toml_str).unwrap();
        assert_eq!(config.dedup.table_name, parsed.dedup.table_name);
        assert_eq!(config.filter.noise_patterns, parsed.filter.noise_patterns);
        assert_eq!(config.notifier.retry_delay_ms, parsed.notifier.retry_delay_ms);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = SentinelConfig::from_file("/nonexistent/path/sqlsentinel.toml").await;
        assert!(matches!(
            result,
            Err(SentinelError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
