//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 디코딩, 저장소, 알림 전송 등 파이프라인 내부에서
//! 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for SentinelError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 배치 수준으로 올라가는 에러는 디코딩 실패뿐이며, 저장소/전송 에러는
//! 오케스트레이터가 레코드 단위로 흡수합니다.

use sqlsentinel_core::error::{PipelineError, SentinelError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 배치 디코딩 실패 (base64, gzip, json 단계)
    #[error("decode error: {stage}: {reason}")]
    Decode {
        /// 실패 단계 (base64, gzip, json, envelope)
        stage: &'static str,
        /// 실패 사유
        reason: String,
    },

    /// 압축 해제 크기 초과
    #[error("decoded payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// 확인된 크기 (바이트)
        size: usize,
        /// 허용 최대 크기 (바이트)
        max: usize,
    },

    /// 중복 제거 저장소 에러 (조회/기록 실패)
    #[error("store error: {backend}: {reason}")]
    Store {
        /// 저장소 백엔드 (memory, file 등)
        backend: String,
        /// 에러 사유
        reason: String,
    },

    /// 알림 전송 실패 (비 2xx 응답 또는 전송 에러)
    #[error("notify error: status {}: {reason}", status_label(.status))]
    Notify {
        /// HTTP 상태 코드 (전송 에러면 None)
        status: Option<u16>,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_owned(), |s| s.to_string())
}

impl LogPipelineError {
    /// 배치를 중단시키는 디코딩 에러인지 확인합니다.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::PayloadTooLarge { .. })
    }
}

impl From<LogPipelineError> for SentinelError {
    fn from(err: LogPipelineError) -> Self {
        if err.is_decode() {
            SentinelError::Pipeline(PipelineError::BatchFailed(err.to_string()))
        } else {
            SentinelError::Pipeline(PipelineError::InitFailed(err.to_string()))
        }
    }
}
