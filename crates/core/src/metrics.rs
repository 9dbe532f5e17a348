//! 메트릭 상수 및 설명 등록
//!
//! 파이프라인이 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 단계는 이 상수로 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 환경(함수 실행 등)에서는 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sqlsentinel_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(sqlsentinel_core::metrics::RECORDS_NOTIFIED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 추출 규칙 레이블 키 (msg_level, error_severity_state, ...)
pub const LABEL_RULE: &str = "rule";

/// 판정 사유 레이블 키 (first_occurrence, cooldown_expired, ...)
pub const LABEL_REASON: &str = "reason";

// ─── 배치 메트릭 ───────────────────────────────────────────────────

/// 처리한 배치 수 (counter)
pub const BATCHES_TOTAL: &str = "sqlsentinel_batches_total";

/// 디코딩 실패로 중단된 배치 수 (counter)
pub const BATCHES_FAILED_TOTAL: &str = "sqlsentinel_batches_failed_total";

/// 디코딩된 로그 라인 수 (counter)
pub const LINES_DECODED_TOTAL: &str = "sqlsentinel_lines_decoded_total";

// ─── 레코드 메트릭 ─────────────────────────────────────────────────

/// 파싱 성공 레코드 수 (counter, label: rule)
pub const RECORDS_PARSED_TOTAL: &str = "sqlsentinel_records_parsed_total";

/// 파싱 실패 후보 수 (counter)
pub const RECORDS_UNPARSEABLE_TOTAL: &str = "sqlsentinel_records_unparseable_total";

/// 필터로 제거된 레코드 수 (counter)
pub const RECORDS_FILTERED_TOTAL: &str = "sqlsentinel_records_filtered_total";

/// 쿨다운으로 억제된 레코드 수 (counter)
pub const RECORDS_SUPPRESSED_TOTAL: &str = "sqlsentinel_records_suppressed_total";

/// 알림 전송 성공 수 (counter, label: reason)
pub const RECORDS_NOTIFIED_TOTAL: &str = "sqlsentinel_records_notified_total";

/// 알림 전송 실패 수 (counter)
pub const NOTIFY_FAILED_TOTAL: &str = "sqlsentinel_notify_failed_total";

/// 중복 제거 저장소 에러 수 (counter)
pub const STORE_ERRORS_TOTAL: &str = "sqlsentinel_store_errors_total";

/// 모든 메트릭 이름 목록
pub const ALL_METRIC_NAMES: &[&str] = &[
    BATCHES_TOTAL,
    BATCHES_FAILED_TOTAL,
    LINES_DECODED_TOTAL,
    RECORDS_PARSED_TOTAL,
    RECORDS_UNPARSEABLE_TOTAL,
    RECORDS_FILTERED_TOTAL,
    RECORDS_SUPPRESSED_TOTAL,
    RECORDS_NOTIFIED_TOTAL,
    NOTIFY_FAILED_TOTAL,
    STORE_ERRORS_TOTAL,
];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없어도 안전합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(BATCHES_TOTAL, "Total number of inbound log batches processed");
    describe_counter!(
        BATCHES_FAILED_TOTAL,
        "Batches aborted because the payload could not be decoded"
    );
    describe_counter!(LINES_DECODED_TOTAL, "Total number of log lines decoded");
    describe_counter!(
        RECORDS_PARSED_TOTAL,
        "Error records parsed into structured errors, per extraction rule"
    );
    describe_counter!(
        RECORDS_UNPARSEABLE_TOTAL,
        "Record candidates that matched no extraction rule"
    );
    describe_counter!(
        RECORDS_FILTERED_TOTAL,
        "Structured errors removed by the noise filter"
    );
    describe_counter!(
        RECORDS_SUPPRESSED_TOTAL,
        "Structured errors suppressed by the dedup cooldown"
    );
    describe_counter!(
        RECORDS_NOTIFIED_TOTAL,
        "Alerts delivered to the webhook, per cooldown decision reason"
    );
    describe_counter!(
        NOTIFY_FAILED_TOTAL,
        "Alerts that could not be delivered after retrying"
    );
    describe_counter!(
        STORE_ERRORS_TOTAL,
        "Dedup store lookups or writes that failed"
    );
}
