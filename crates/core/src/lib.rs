//! sqlsentinel 공통 크레이트
//!
//! SQL Server 에러 로그 알림 파이프라인의 모든 크레이트가 공유하는
//! 데이터 모델, 에러 타입, 설정, 메트릭 이름을 정의합니다.
//!
//! - [`types`]: `LogLine`, `StructuredError`, `DedupEntry` 등 도메인 타입
//! - [`config`]: `sqlsentinel.toml` 파싱 및 환경변수 오버라이드
//! - [`error`]: 최상위 에러 타입
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, SentinelError};

// 설정
pub use config::SentinelConfig;

// 도메인 타입
pub use types::{
    CooldownDecision, CooldownReason, DedupEntry, ErrorRecordCandidate, InvocationResult,
    InvocationStatus, LogLine, RecordOutcome, StructuredError,
};
