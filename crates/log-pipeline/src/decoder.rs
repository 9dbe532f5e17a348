//! 배치 디코더 -- CloudWatch Logs 구독 페이로드를 로그 라인으로 변환합니다.
//!
//! 인바운드 이벤트는 `{"awslogs": {"data": "<base64>"}}` 형태이며,
//! `data`는 gzip으로 압축된 JSON 문서입니다:
//!
//! ```text
//! base64 -> gzip -> JSON { messageType, logGroup, logStream, logEvents: [{ id, timestamp, message }] }
//! ```
//!
//! 어느 단계든 실패하면 배치 전체가 실패하며 부분 결과는 만들지 않습니다.
//! [`encode_batch`]는 정확한 역변환으로, 픽스처와 라운드트립 검증에 사용합니다.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use sqlsentinel_core::types::LogLine;

use crate::error::LogPipelineError;

/// 데이터 배치 메시지 타입
pub const DATA_MESSAGE: &str = "DATA_MESSAGE";

/// 구독 상태 확인용 제어 메시지 타입 (로그 라인 없음)
pub const CONTROL_MESSAGE: &str = "CONTROL_MESSAGE";

/// 인바운드 이벤트 봉투
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// 구독 데이터
    pub awslogs: AwsLogsData,
}

/// 봉투 내부의 인코딩된 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsLogsData {
    /// base64(gzip(JSON)) 페이로드
    pub data: String,
}

impl InboundEvent {
    /// 인코딩된 페이로드로 이벤트를 만듭니다.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            awslogs: AwsLogsData { data: data.into() },
        }
    }

    /// JSON 바이트에서 이벤트 봉투를 파싱합니다.
    pub fn from_json(raw: &[u8]) -> Result<Self, LogPipelineError> {
        serde_json::from_slice(raw).map_err(|e| LogPipelineError::Decode {
            stage: "envelope",
            reason: e.to_string(),
        })
    }
}

/// 압축 해제된 구독 페이로드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsPayload {
    /// 메시지 타입 (DATA_MESSAGE, CONTROL_MESSAGE)
    #[serde(default = "default_message_type")]
    pub message_type: String,
    /// 계정 ID
    #[serde(default)]
    pub owner: String,
    /// 로그 그룹
    #[serde(default)]
    pub log_group: String,
    /// 로그 스트림 (소스 스트림 식별자)
    pub log_stream: String,
    /// 구독 필터 이름 목록
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    /// 로그 이벤트 (발생 순서)
    #[serde(default)]
    pub log_events: Vec<LogEventRecord>,
}

fn default_message_type() -> String {
    DATA_MESSAGE.to_owned()
}

/// 페이로드 내 단일 로그 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEventRecord {
    /// 이벤트 ID
    #[serde(default)]
    pub id: String,
    /// 타임스탬프 (epoch 밀리초)
    pub timestamp: i64,
    /// 로그 메시지
    pub message: String,
}

/// 디코딩된 배치
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBatch {
    /// 메시지 타입
    pub message_type: String,
    /// 로그 그룹
    pub log_group: String,
    /// 로그 스트림
    pub log_stream: String,
    /// 원래 순서의 로그 라인
    pub lines: Vec<LogLine>,
}

impl DecodedBatch {
    /// 제어 메시지 배치인지 확인합니다.
    pub fn is_control(&self) -> bool {
        self.message_type == CONTROL_MESSAGE
    }
}

/// 배치 디코더
///
/// 순수 변환기로 I/O를 하지 않습니다.
/// 압축 해제 크기는 `max_decoded_bytes`로 제한합니다.
#[derive(Debug, Clone)]
pub struct BatchDecoder {
    /// 압축 해제 후 최대 크기 (바이트)
    max_decoded_bytes: usize,
}

impl BatchDecoder {
    /// 최대 크기를 지정하여 디코더를 생성합니다.
    pub fn new(max_decoded_bytes: usize) -> Self {
        Self { max_decoded_bytes }
    }

    /// 인바운드 이벤트를 디코딩합니다.
    pub fn decode_event(&self, event: &InboundEvent) -> Result<DecodedBatch, LogPipelineError> {
        self.decode(&event.awslogs.data)
    }

    /// base64 페이로드를 디코딩합니다.
    pub fn decode(&self, data: &str) -> Result<DecodedBatch, LogPipelineError> {
        let payload = self.decode_payload(data)?;

        if payload.message_type == CONTROL_MESSAGE {
            tracing::debug!(log_group = %payload.log_group, "control message received, no log events");
            return Ok(DecodedBatch {
                message_type: payload.message_type,
                log_group: payload.log_group,
                log_stream: payload.log_stream,
                lines: Vec::new(),
            });
        }

        let lines = payload
            .log_events
            .into_iter()
            .map(|event| LogLine::new(payload.log_stream.clone(), event.timestamp, event.message))
            .collect();

        Ok(DecodedBatch {
            message_type: payload.message_type,
            log_group: payload.log_group,
            log_stream: payload.log_stream,
            lines,
        })
    }

    /// base64 페이로드를 [`LogsPayload`]로 디코딩합니다.
    pub fn decode_payload(&self, data: &str) -> Result<LogsPayload, LogPipelineError> {
        // 줄바꿈이 섞인 base64도 허용
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let compressed = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| LogPipelineError::Decode {
                stage: "base64",
                reason: e.to_string(),
            })?;

        let json = self.decompress(&compressed)?;

        serde_json::from_slice(&json).map_err(|e| LogPipelineError::Decode {
            stage: "json",
            reason: e.to_string(),
        })
    }

    /// gzip 압축을 해제합니다. 최대 크기를 넘으면 즉시 중단합니다.
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, LogPipelineError> {
        let limit = u64::try_from(self.max_decoded_bytes)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut decoder = GzDecoder::new(compressed).take(limit);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| LogPipelineError::Decode {
                stage: "gzip",
                reason: e.to_string(),
            })?;

        if out.len() > self.max_decoded_bytes {
            return Err(LogPipelineError::PayloadTooLarge {
                size: out.len(),
                max: self.max_decoded_bytes,
            });
        }
        Ok(out)
    }
}

impl Default for BatchDecoder {
    fn default() -> Self {
        Self::new(8 * 1024 * 1024)
    }
}

/// 페이로드를 인바운드 `data` 문자열로 인코딩합니다 (디코딩의 역변환).
pub fn encode_batch(payload: &LogsPayload) -> Result<String, LogPipelineError> {
    let json = serde_json::to_vec(payload)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// 로그 스트림과 (타임스탬프, 메시지) 목록으로 데이터 페이로드를 만듭니다.
pub fn data_payload(
    log_group: &str,
    log_stream: &str,
    events: impl IntoIterator<Item = (i64, String)>,
) -> LogsPayload {
    LogsPayload {
        message_type: DATA_MESSAGE.to_owned(),
        owner: String::new(),
        log_group: log_group.to_owned(),
        log_stream: log_stream.to_owned(),
        subscription_filters: Vec::new(),
        log_events: events
            .into_iter()
            .enumerate()
            .map(|(idx, (timestamp, message))| LogEventRecord {
                id: idx.to_string(),
                timestamp,
                message,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_payload() -> LogsPayload {
        data_payload(
            "/aws/rds/instance/prod-sql/error",
            "prod-sql",
            vec![
                (
                    1_700_000_000_000,
                    "2024-01-15 12:00:00.12 Logon       Error: 18456, Severity: 14, State: 8."
                        .to_owned(),
                ),
                (
                    1_700_000_000_001,
                    "2024-01-15 12:00:00.12 Logon       Login failed for user 'sa'.".to_owned(),
                ),
            ],
        )
    }

    #[test]
    fn decodes_lines_in_order_with_stream() {
        let data = encode_batch(&sample_payload()).unwrap();
        let batch = BatchDecoder::default().decode(&data).unwrap();

        assert_eq!(batch.log_group, "/aws/rds/instance/prod-sql/error");
        assert_eq!(batch.log_stream, "prod-sql");
        assert_eq!(batch.lines.len(), 2);
        assert_eq!(batch.lines[0].timestamp_millis, 1_700_000_000_000);
        assert!(batch.lines[0].raw_text.contains("Error: 18456"));
        assert!(batch.lines[1].raw_text.contains("Login failed"));
        assert!(batch.lines.iter().all(|l| l.source_stream == "prod-sql"));
    }

    #[test]
    fn accepts_base64_with_line_breaks() {
        let data = encode_batch(&sample_payload()).unwrap();
        let wrapped: String = data
            .as_bytes()
            .chunks(20)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let batch = BatchDecoder::default().decode(&wrapped).unwrap();
        assert_eq!(batch.lines.len(), 2);
    }

    #[test]
    fn control_message_yields_no_lines() {
        let mut payload = sample_payload();
        payload.message_type = CONTROL_MESSAGE.to_owned();
        let data = encode_batch(&payload).unwrap();
        let batch = BatchDecoder::default().decode(&data).unwrap();
        assert!(batch.is_control());
        assert!(batch.lines.is_empty());
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let err = BatchDecoder::default().decode("!!!not base64!!!").unwrap_err();
        assert!(matches!(err, LogPipelineError::Decode { stage: "base64", .. }));
    }

    #[test]
    fn non_gzip_payload_is_decode_error() {
        let data = STANDARD.encode(b"{\"logStream\":\"s\"}");
        let err = BatchDecoder::default().decode(&data).unwrap_err();
        assert!(matches!(err, LogPipelineError::Decode { stage: "gzip", .. }));
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{ not json").unwrap();
        let data = STANDARD.encode(encoder.finish().unwrap());
        let err = BatchDecoder::default().decode(&data).unwrap_err();
        assert!(matches!(err, LogPipelineError::Decode { stage: "json", .. }));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let data = encode_batch(&sample_payload()).unwrap();
        let err = BatchDecoder::new(16).decode(&data).unwrap_err();
        assert!(matches!(err, LogPipelineError::PayloadTooLarge { max: 16, .. }));
    }

    #[test]
    fn inbound_event_envelope_parses() {
        let data = encode_batch(&sample_payload()).unwrap();
        let raw = serde_json::to_vec(&InboundEvent::new(data)).unwrap();
        let event = InboundEvent::from_json(&raw).unwrap();
        let batch = BatchDecoder::default().decode_event(&event).unwrap();
        assert_eq!(batch.lines.len(), 2);
    }

    #[test]
    fn envelope_without_awslogs_is_decode_error() {
        let err = InboundEvent::from_json(br#"{"records": []}"#).unwrap_err();
        assert!(matches!(err, LogPipelineError::Decode { stage: "envelope", .. }));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            events in proptest::collection::vec((0i64..4_102_444_800_000, ".{0,120}"), 0..20)
        ) {
            let payload = data_payload("group", "stream-1", events.clone());
            let data = encode_batch(&payload).unwrap();
            let batch = BatchDecoder::default().decode(&data).unwrap();

            prop_assert_eq!(batch.lines.len(), events.len());
            for (line, (ts, msg)) in batch.lines.iter().zip(events.iter()) {
                prop_assert_eq!(line.timestamp_millis, *ts);
                prop_assert_eq!(&line.raw_text, msg);
                prop_assert_eq!(line.source_stream.as_str(), "stream-1");
            }
        }
    }
}
