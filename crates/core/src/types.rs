//! 도메인 타입 -- 파이프라인 전 단계에서 공유하는 데이터 구조
//!
//! 디코더가 만든 [`LogLine`]이 조립기에서 [`ErrorRecordCandidate`]로 묶이고,
//! 파서가 이를 [`StructuredError`]로 변환합니다.
//! 중복 제거 저장소는 [`DedupEntry`]만 영속화합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 물리 로그 한 줄
///
/// 디코더가 생성하며 조립 이후에는 버려집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// 소스 스트림 식별자 (log stream 이름)
    pub source_stream: String,
    /// 이벤트 타임스탬프 (epoch 밀리초)
    pub timestamp_millis: i64,
    /// 원본 텍스트
    pub raw_text: String,
}

impl LogLine {
    /// 새 로그 라인을 생성합니다.
    pub fn new(
        source_stream: impl Into<String>,
        timestamp_millis: i64,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            source_stream: source_stream.into(),
            timestamp_millis,
            raw_text: raw_text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}@{}] {}",
            self.source_stream, self.timestamp_millis, self.raw_text
        )
    }
}

/// 여러 물리 라인으로 구성될 수 있는 에러 레코드 후보
///
/// 조립기가 헤더 라인에서 시작해 연속 라인을 덧붙여 만들고,
/// 완성되면 소유권을 파서에 넘깁니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecordCandidate {
    /// 구성 라인 (원래 순서)
    pub lines: Vec<LogLine>,
    /// 첫 라인의 타임스탬프 (epoch 밀리초)
    pub start_timestamp: i64,
}

impl ErrorRecordCandidate {
    /// 첫 라인으로 후보를 시작합니다.
    pub fn start(line: LogLine) -> Self {
        Self {
            start_timestamp: line.timestamp_millis,
            lines: vec![line],
        }
    }

    /// 연속 라인을 덧붙입니다.
    pub fn push(&mut self, line: LogLine) {
        self.lines.push(line);
    }

    /// 구성 라인 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 라인이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 첫 라인의 소스 스트림을 반환합니다.
    pub fn source_stream(&self) -> &str {
        self.lines
            .first()
            .map(|l| l.source_stream.as_str())
            .unwrap_or_default()
    }
}

/// 파싱된 SQL Server 에러
///
/// `error_number`는 파싱 성공 시 항상 존재합니다.
/// `message`는 구성 라인들의 본문을 공백 하나로 이어 붙인 값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    /// 에러 번호
    pub error_number: u32,
    /// 심각도 (SQL Server severity level 0-25)
    pub severity: Option<u8>,
    /// 에러 상태
    pub state: Option<u8>,
    /// 메시지 본문
    pub message: String,
    /// 레코드 시작 타임스탬프 (epoch 밀리초)
    pub timestamp_millis: i64,
    /// 서버 이름 (`Msg ... Server ...` 형식)
    pub server: Option<String>,
    /// 배치 내 라인 번호 (`Msg ... Line ...` 형식)
    pub line: Option<u32>,
    /// 로그 본문에 포함된 SQL Server 타임스탬프 텍스트
    pub log_timestamp: Option<String>,
    /// 소스 스트림 식별자
    pub source_stream: String,
    /// 매칭된 추출 규칙 이름
    pub rule: String,
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {}", self.error_number)?;
        if let Some(severity) = self.severity {
            write!(f, " severity={severity}")?;
        }
        if let Some(state) = self.state {
            write!(f, " state={state}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// 영속화되는 중복 제거 엔트리
///
/// 파티션 키 `errorNumber`, 정렬 키 `timestamp`(ms),
/// 만료 속성 `expiryEpochSeconds`(s). 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupEntry {
    /// 에러 번호 (파티션 키)
    pub error_number: u32,
    /// 기록 시각 (정렬 키, epoch 밀리초)
    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
    /// 만료 시각 (epoch 초)
    pub expiry_epoch_seconds: i64,
}

impl DedupEntry {
    /// 기록 시각과 보존 시간으로 엔트리를 만듭니다.
    pub fn new(error_number: u32, now_millis: i64, ttl_hours: u32) -> Self {
        Self {
            error_number,
            timestamp_millis: now_millis,
            expiry_epoch_seconds: now_millis.div_euclid(1000) + i64::from(ttl_hours) * 3600,
        }
    }

    /// 주어진 시각 기준으로 만료되었는지 확인합니다.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expiry_epoch_seconds <= now_millis.div_euclid(1000)
    }
}

/// 쿨다운 판정 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownReason {
    /// 이전 기록 없음
    FirstOccurrence,
    /// 마지막 기록이 쿨다운보다 오래됨
    CooldownExpired,
    /// 쿨다운 윈도우 내 반복 발생
    WithinCooldown,
    /// 저장소 조회 실패로 정책에 따라 결정됨
    StoreUnavailable,
}

impl fmt::Display for CooldownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstOccurrence => write!(f, "first_occurrence"),
            Self::CooldownExpired => write!(f, "cooldown_expired"),
            Self::WithinCooldown => write!(f, "within_cooldown"),
            Self::StoreUnavailable => write!(f, "store_unavailable"),
        }
    }
}

/// 레코드 단위 알림 여부 판정 (영속화되지 않음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownDecision {
    /// 알림 전송 여부
    pub should_notify: bool,
    /// 판정 사유
    pub reason: CooldownReason,
}

impl CooldownDecision {
    /// 이전 기록이 없는 경우
    pub const fn first_occurrence() -> Self {
        Self {
            should_notify: true,
            reason: CooldownReason::FirstOccurrence,
        }
    }

    /// 쿨다운이 지난 경우
    pub const fn cooldown_expired() -> Self {
        Self {
            should_notify: true,
            reason: CooldownReason::CooldownExpired,
        }
    }

    /// 쿨다운 윈도우 안인 경우
    pub const fn within_cooldown() -> Self {
        Self {
            should_notify: false,
            reason: CooldownReason::WithinCooldown,
        }
    }

    /// 저장소 장애 시 정책에 따른 판정
    pub const fn store_unavailable(should_notify: bool) -> Self {
        Self {
            should_notify,
            reason: CooldownReason::StoreUnavailable,
        }
    }
}

/// 레코드 단위 최종 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// 알림 전송 성공
    Notified,
    /// 쿨다운으로 억제됨
    Suppressed,
    /// 재시도 후에도 전송 실패
    NotifyFailed,
}

/// 호출 결과 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// 배치 처리 완료 (개별 레코드 실패 포함 가능)
    #[default]
    Succeeded,
    /// 배치 전체 실패 (디코딩 실패)
    Failed,
}

/// 한 번의 호출(배치)에 대한 집계 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// 호출 상태
    pub status: InvocationStatus,
    /// 파싱에 성공한 레코드 수
    pub parsed: u64,
    /// 파싱되지 않아 버려진 후보 수
    pub unparseable: u64,
    /// 필터로 제거된 레코드 수
    pub filtered: u64,
    /// 쿨다운으로 억제된 레코드 수
    pub suppressed: u64,
    /// 알림 전송 성공 수
    pub notified: u64,
    /// 알림 전송 실패 수
    pub failed: u64,
    /// 배치 실패 사유
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResult {
    /// 배치 실패 결과를 생성합니다.
    pub fn batch_failed(reason: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Failed,
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    /// 레코드 처리 결과를 집계에 반영합니다.
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Notified => self.notified += 1,
            RecordOutcome::Suppressed => self.suppressed += 1,
            RecordOutcome::NotifyFailed => self.failed += 1,
        }
    }

    /// 배치가 성공했는지 확인합니다.
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }
}

impl fmt::Display for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parsed={} unparseable={} filtered={} suppressed={} notified={} failed={}",
            self.parsed,
            self.unparseable,
            self.filtered,
            self.suppressed,
            self.notified,
            self.failed,
        )
    }
}
