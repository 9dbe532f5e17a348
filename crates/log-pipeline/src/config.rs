//! 알림 파이프라인 설정
//!
//! [`AlertConfig`]는 core의 [`SentinelConfig`]에서 파생되며, 오케스트레이터가
//! 생성 시점에 명시적으로 받는 값입니다. 전역 상태나 환경변수를 직접 읽지 않습니다.
//!
//! # 사용 예시
//! ```
//! use sqlsentinel_core::config::SentinelConfig;
//! use sqlsentinel_log_pipeline::config::{AlertConfig, DispatchOrder};
//!
//! let core_config = SentinelConfig::default();
//! let config = AlertConfig::from_core(&core_config).unwrap();
//! assert_eq!(config.dispatch_order, DispatchOrder::WriteThenNotify);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use sqlsentinel_core::config::{DEFAULT_NOISE_PATTERNS, SentinelConfig};

use crate::error::LogPipelineError;

/// 저장소 조회 실패 시 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// 알림 전송 (기본값, 누락보다 중복을 택함)
    #[default]
    FailOpen,
    /// 알림 억제
    FailClosed,
}

impl StoreFailurePolicy {
    /// 조회 실패 시 알림 여부
    pub fn should_notify(self) -> bool {
        matches!(self, Self::FailOpen)
    }
}

impl FromStr for StoreFailurePolicy {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail_open" => Ok(Self::FailOpen),
            "fail_closed" => Ok(Self::FailClosed),
            other => Err(LogPipelineError::Config {
                field: "dedup.store_failure_policy".to_owned(),
                reason: format!("unknown policy '{other}'"),
            }),
        }
    }
}

impl fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailOpen => write!(f, "fail_open"),
            Self::FailClosed => write!(f, "fail_closed"),
        }
    }
}

/// 중복 제거 기록과 알림 전송의 순서
///
/// 두 순서 모두 기록은 알림하기로 판정된 경우에만 일어납니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrder {
    /// 기록 후 전송 (기본값)
    #[default]
    WriteThenNotify,
    /// 전송 후 기록
    NotifyThenWrite,
}

impl FromStr for DispatchOrder {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write_then_notify" => Ok(Self::WriteThenNotify),
            "notify_then_write" => Ok(Self::NotifyThenWrite),
            other => Err(LogPipelineError::Config {
                field: "dedup.dispatch_order".to_owned(),
                reason: format!("unknown dispatch order '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DispatchOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteThenNotify => write!(f, "write_then_notify"),
            Self::NotifyThenWrite => write!(f, "notify_then_write"),
        }
    }
}

/// 알림 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// 압축 해제 후 최대 페이로드 크기 (바이트)
    pub max_decoded_bytes: usize,
    /// 에러 레코드당 최대 라인 수
    pub max_lines_per_record: usize,
    /// 내장 목록에 추가할 무시 에러 번호
    pub ignored_error_numbers: Vec<u32>,
    /// 최소 심각도
    pub min_severity: Option<u8>,
    /// 정보성 메시지 패턴
    pub noise_patterns: Vec<String>,
    /// 알림 쿨다운 (분)
    pub cooldown_minutes: u32,
    /// 중복 제거 엔트리 보존 시간 (시간)
    pub ttl_hours: u32,
    /// 저장소 조회 실패 시 정책
    pub store_failure_policy: StoreFailurePolicy,
    /// 기록/전송 순서
    pub dispatch_order: DispatchOrder,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_decoded_bytes: 8 * 1024 * 1024,
            max_lines_per_record: 16,
            ignored_error_numbers: Vec::new(),
            min_severity: None,
            noise_patterns: DEFAULT_NOISE_PATTERNS.iter().map(|p| (*p).to_owned()).collect(),
            cooldown_minutes: 15,
            ttl_hours: 10,
            store_failure_policy: StoreFailurePolicy::FailOpen,
            dispatch_order: DispatchOrder::WriteThenNotify,
        }
    }
}

impl AlertConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &SentinelConfig) -> Result<Self, LogPipelineError> {
        let config = Self {
            max_decoded_bytes: core.decoder.max_decoded_bytes,
            max_lines_per_record: core.assembler.max_lines_per_record,
            ignored_error_numbers: core.filter.ignored_error_numbers.clone(),
            min_severity: core.filter.min_severity,
            noise_patterns: core.filter.noise_patterns.clone(),
            cooldown_minutes: core.dedup.cooldown_minutes,
            ttl_hours: core.dedup.ttl_hours,
            store_failure_policy: core.dedup.store_failure_policy.parse()?,
            dispatch_order: core.dedup.dispatch_order.parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_SEVERITY: u8 = 25;

        if self.max_decoded_bytes == 0 {
            return Err(LogPipelineError::Config {
                field: "max_decoded_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_lines_per_record == 0 {
            return Err(LogPipelineError::Config {
                field: "max_lines_per_record".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if let Some(severity) = self.min_severity
            && severity > MAX_SEVERITY
        {
            return Err(LogPipelineError::Config {
                field: "min_severity".to_owned(),
                reason: format!("must be 0-{MAX_SEVERITY}"),
            });
        }

        if self.cooldown_minutes == 0 {
            return Err(LogPipelineError::Config {
                field: "cooldown_minutes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.ttl_hours == 0 {
            return Err(LogPipelineError::Config {
                field: "ttl_hours".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if u64::from(self.ttl_hours) * 60 < u64::from(self.cooldown_minutes) {
            return Err(LogPipelineError::Config {
                field: "ttl_hours".to_owned(),
                reason: format!(
                    "entries would expire before the {}m cooldown ends",
                    self.cooldown_minutes
                ),
            });
        }

        Ok(())
    }
}

/// 알림 파이프라인 설정 빌더
#[derive(Default)]
pub struct AlertConfigBuilder {
    config: AlertConfig,
}

impl AlertConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cooldown_minutes(mut self, minutes: u32) -> Self {
        self.config.cooldown_minutes = minutes;
        self
    }

    pub fn ttl_hours(mut self, hours: u32) -> Self {
        self.config.ttl_hours = hours;
        self
    }

    pub fn min_severity(mut self, severity: u8) -> Self {
        self.config.min_severity = Some(severity);
        self
    }

    pub fn ignored_error_numbers(mut self, numbers: Vec<u32>) -> Self {
        self.config.ignored_error_numbers = numbers;
        self
    }

    pub fn noise_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.noise_patterns = patterns;
        self
    }

    pub fn max_lines_per_record(mut self, max: usize) -> Self {
        self.config.max_lines_per_record = max;
        self
    }

    pub fn store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.config.store_failure_policy = policy;
        self
    }

    pub fn dispatch_order(mut self, order: DispatchOrder) -> Self {
        self.config.dispatch_order = order;
        self
    }

    pub fn build(self) -> Result<AlertConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
