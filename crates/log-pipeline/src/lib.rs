//! sqlsentinel 로그 파이프라인 -- SQL Server 에러 로그 배치를 알림으로 변환합니다.
//!
//! # 모듈 구성
//!
//! - [`decoder`]: base64 + gzip + JSON 구독 페이로드 디코딩
//! - [`assembler`]: 여러 물리 라인으로 나뉜 에러 레코드 조립
//! - [`parser`]: 순서가 있는 추출 규칙으로 구조화 에러 생성
//! - [`filter`]: 정보성 에러 번호/메시지 제거
//! - [`dedup`]: 에러 번호별 쿨다운 판정 저장소 (메모리, 파일)
//! - [`notifier`]: 알림 메시지 렌더링 및 웹훅 전송
//! - [`orchestrator`]: 배치 단위 전체 흐름과 결과 집계
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`clock`]: 현재 시각 공급자
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! InboundEvent -> BatchDecoder -> ErrorRecordAssembler -> ErrorParser -> MessageFilter
//!                                                                            |
//!                                   InvocationResult <- Notifier <- DedupStore
//! ```

pub mod assembler;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod notifier;
pub mod orchestrator;
pub mod parser;

// --- 주요 타입 re-export ---

// 오케스트레이터
pub use orchestrator::{BatchStage, Orchestrator};

// 설정
pub use config::{AlertConfig, AlertConfigBuilder, DispatchOrder, StoreFailurePolicy};

// 에러
pub use error::LogPipelineError;

// 디코더
pub use decoder::{BatchDecoder, DecodedBatch, InboundEvent, LogsPayload, encode_batch};

// 조립/파싱/필터
pub use assembler::ErrorRecordAssembler;
pub use filter::{FilterVerdict, MessageFilter, NoiseMatcher};
pub use parser::{ErrorParser, ParseOutcome};

// 중복 제거
pub use dedup::{DedupStore, FileDedupStore, MemoryDedupStore};

// 알림
pub use notifier::{Notifier, RecordingNotifier, WebhookNotifier, WebhookSettings, format_alert};

// 시계
pub use clock::{Clock, ManualClock, SystemClock};
