//! 에러 타입 -- 도메인별 에러 정의

/// sqlsentinel 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 배치 전체 실패 (디코딩 실패 등 치명적 에러)
    #[error("batch failed: {0}")]
    BatchFailed(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_sentinel_error() {
        let err: SentinelError = ConfigError::InvalidValue {
            field: "dedup.cooldown_minutes".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(err, SentinelError::Config(_)));
        assert!(err.to_string().contains("dedup.cooldown_minutes"));
    }

    #[test]
    fn batch_failed_display() {
        let err: SentinelError = PipelineError::BatchFailed("invalid gzip header".to_owned()).into();
        assert_eq!(
            err.to_string(),
            "pipeline error: batch failed: invalid gzip header"
        );
    }
}
