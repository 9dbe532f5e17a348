//! 오케스트레이터 -- 배치 하나를 디코딩부터 알림까지 처리합니다.
//!
//! # 처리 단계
//! ```text
//! Decoding -> Assembling -> ParsingAndFiltering -> PerRecordDedupAndNotify -> Done
//!     |
//!     +-> BatchFailed (디코딩 실패만 배치 전체를 실패시킴)
//! ```
//!
//! 레코드는 순서대로 하나씩 처리합니다. 같은 배치 안에서 반복된 에러는
//! 첫 발생 때 기록된 엔트리로 억제됩니다. 한 레코드의 저장소/전송 실패는
//! 다른 레코드 처리를 막지 않습니다.
//!
//! # 레코드 처리
//! 1. `decide`로 쿨다운 판정 (조회 실패 시 [`StoreFailurePolicy`] 적용)
//! 2. 알림으로 판정된 경우에만 `record` 호출 ([`DispatchOrder`]에 따라 전송 전/후)
//! 3. 전송 결과로 `Notified` 또는 `NotifyFailed`

use sqlsentinel_core::metrics as m;
use sqlsentinel_core::types::{
    CooldownDecision, InvocationResult, RecordOutcome, StructuredError,
};

use crate::assembler::ErrorRecordAssembler;
use crate::clock::{Clock, SystemClock};
use crate::config::{AlertConfig, DispatchOrder};
use crate::decoder::{BatchDecoder, DecodedBatch, InboundEvent};
use crate::dedup::DedupStore;
use crate::error::LogPipelineError;
use crate::filter::{FilterVerdict, MessageFilter, NoiseMatcher};
use crate::notifier::{Notifier, format_alert};
use crate::parser::{ErrorParser, ParseOutcome};

/// 배치 처리 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Decoding,
    Assembling,
    ParsingAndFiltering,
    PerRecordDedupAndNotify,
    Done,
    BatchFailed,
}

impl BatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decoding => "decoding",
            Self::Assembling => "assembling",
            Self::ParsingAndFiltering => "parsing_and_filtering",
            Self::PerRecordDedupAndNotify => "per_record_dedup_and_notify",
            Self::Done => "done",
            Self::BatchFailed => "batch_failed",
        }
    }
}

/// 배치 오케스트레이터
///
/// 저장소, 알림기, 시계를 주입받습니다. 설정은 생성 시점에 고정됩니다.
///
/// # 사용 예시
/// ```
/// # async fn example() -> Result<(), sqlsentinel_log_pipeline::LogPipelineError> {
/// use sqlsentinel_log_pipeline::{
///     AlertConfig, ManualClock, MemoryDedupStore, Orchestrator, RecordingNotifier,
/// };
///
/// let orchestrator = Orchestrator::new(
///     AlertConfig::default(),
///     MemoryDedupStore::new(),
///     RecordingNotifier::new(),
///     ManualClock::new(1_700_000_000_000),
/// )?;
/// let result = orchestrator.process_data("not base64!").await;
/// assert!(!result.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<S, N, C = SystemClock> {
    config: AlertConfig,
    decoder: BatchDecoder,
    assembler: ErrorRecordAssembler,
    parser: ErrorParser,
    filter: MessageFilter,
    store: S,
    notifier: N,
    clock: C,
}

impl<S, N, C> Orchestrator<S, N, C>
where
    S: DedupStore,
    N: Notifier,
    C: Clock,
{
    /// 설정과 주입된 의존성으로 오케스트레이터를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 노이즈 패턴이 컴파일되지 않으면 에러를 반환합니다.
    pub fn new(config: AlertConfig, store: S, notifier: N, clock: C) -> Result<Self, LogPipelineError> {
        config.validate()?;

        let noise = NoiseMatcher::new(config.noise_patterns.as_slice())?;
        let assembler = ErrorRecordAssembler::new(noise.clone(), config.max_lines_per_record)?;
        let filter = MessageFilter::new(&config.ignored_error_numbers, config.min_severity, noise);
        let parser = ErrorParser::with_builtin_rules()?;

        tracing::debug!(
            cooldown_minutes = config.cooldown_minutes,
            ttl_hours = config.ttl_hours,
            policy = %config.store_failure_policy,
            order = %config.dispatch_order,
            backend = store.backend(),
            "orchestrator initialized"
        );

        Ok(Self {
            decoder: BatchDecoder::new(config.max_decoded_bytes),
            config,
            assembler,
            parser,
            filter,
            store,
            notifier,
            clock,
        })
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// 주입된 저장소
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 주입된 알림기
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// 원시 인바운드 이벤트(JSON)를 처리합니다.
    pub async fn process_raw_event(&self, raw: &[u8]) -> InvocationResult {
        match InboundEvent::from_json(raw) {
            Ok(event) => self.process_event(&event).await,
            Err(e) => {
                metrics::counter!(m::BATCHES_TOTAL).increment(1);
                self.fail_batch(&e)
            }
        }
    }

    /// 인바운드 이벤트를 처리합니다.
    pub async fn process_event(&self, event: &InboundEvent) -> InvocationResult {
        self.process_data(&event.awslogs.data).await
    }

    /// base64 페이로드 하나를 처리합니다.
    pub async fn process_data(&self, data: &str) -> InvocationResult {
        metrics::counter!(m::BATCHES_TOTAL).increment(1);
        tracing::trace!(stage = BatchStage::Decoding.as_str());

        match self.decoder.decode(data) {
            Ok(batch) => self.process_batch(batch).await,
            Err(e) => self.fail_batch(&e),
        }
    }

    /// 디코딩된 배치를 처리합니다.
    pub async fn process_batch(&self, batch: DecodedBatch) -> InvocationResult {
        let mut result = InvocationResult::default();
        let DecodedBatch {
            log_group,
            log_stream,
            lines,
            ..
        } = batch;

        metrics::counter!(m::LINES_DECODED_TOTAL).increment(lines.len() as u64);
        tracing::trace!(stage = BatchStage::Assembling.as_str(), lines = lines.len());

        let mut alerts = Vec::new();
        for candidate in self.assembler.assemble(lines) {
            match self.parser.parse(&candidate) {
                ParseOutcome::Parsed(error) => {
                    result.parsed += 1;
                    metrics::counter!(m::RECORDS_PARSED_TOTAL, m::LABEL_RULE => error.rule.clone())
                        .increment(1);

                    let verdict = self.filter.verdict(&error);
                    if verdict == FilterVerdict::Keep {
                        alerts.push(error);
                    } else {
                        result.filtered += 1;
                        metrics::counter!(m::RECORDS_FILTERED_TOTAL, m::LABEL_REASON => verdict.as_str())
                            .increment(1);
                        tracing::debug!(
                            error_number = error.error_number,
                            verdict = verdict.as_str(),
                            "record filtered"
                        );
                    }
                }
                ParseOutcome::Unparseable => {
                    result.unparseable += 1;
                    metrics::counter!(m::RECORDS_UNPARSEABLE_TOTAL).increment(1);
                }
            }
        }
        tracing::trace!(
            stage = BatchStage::ParsingAndFiltering.as_str(),
            parsed = result.parsed,
            kept = alerts.len()
        );

        tracing::trace!(stage = BatchStage::PerRecordDedupAndNotify.as_str());
        for error in &alerts {
            let outcome = self.dispatch(error, &log_group).await;
            result.record(outcome);
        }

        tracing::info!(
            stage = BatchStage::Done.as_str(),
            log_group = %log_group,
            log_stream = %log_stream,
            parsed = result.parsed,
            unparseable = result.unparseable,
            filtered = result.filtered,
            suppressed = result.suppressed,
            notified = result.notified,
            failed = result.failed,
            "batch processed"
        );
        result
    }

    /// 레코드 하나의 쿨다운 판정, 기록, 전송을 수행합니다.
    async fn dispatch(&self, error: &StructuredError, log_group: &str) -> RecordOutcome {
        let now = self.clock.now_millis();
        let decision = self.decide(error.error_number, now).await;

        if !decision.should_notify {
            metrics::counter!(m::RECORDS_SUPPRESSED_TOTAL, m::LABEL_REASON => decision.reason.to_string())
                .increment(1);
            tracing::debug!(
                error_number = error.error_number,
                reason = %decision.reason,
                "notification suppressed"
            );
            return RecordOutcome::Suppressed;
        }

        let text = format_alert(error, log_group, &error.source_stream);
        match self.config.dispatch_order {
            DispatchOrder::WriteThenNotify => {
                self.write(error.error_number, now).await;
                self.notify(error, &text, &decision).await
            }
            DispatchOrder::NotifyThenWrite => {
                let outcome = self.notify(error, &text, &decision).await;
                self.write(error.error_number, now).await;
                outcome
            }
        }
    }

    async fn decide(&self, error_number: u32, now: i64) -> CooldownDecision {
        match self
            .store
            .decide(error_number, now, self.config.cooldown_minutes)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                metrics::counter!(m::STORE_ERRORS_TOTAL).increment(1);
                let policy = self.config.store_failure_policy;
                tracing::warn!(
                    error_number,
                    error = %e,
                    policy = %policy,
                    "dedup lookup failed"
                );
                CooldownDecision::store_unavailable(policy.should_notify())
            }
        }
    }

    async fn write(&self, error_number: u32, now: i64) {
        if let Err(e) = self
            .store
            .record(error_number, now, self.config.ttl_hours)
            .await
        {
            metrics::counter!(m::STORE_ERRORS_TOTAL).increment(1);
            tracing::warn!(error_number, error = %e, "dedup write failed");
        }
    }

    async fn notify(
        &self,
        error: &StructuredError,
        text: &str,
        decision: &CooldownDecision,
    ) -> RecordOutcome {
        match self.notifier.send(text).await {
            Ok(()) => {
                metrics::counter!(m::RECORDS_NOTIFIED_TOTAL, m::LABEL_REASON => decision.reason.to_string())
                    .increment(1);
                tracing::info!(
                    error_number = error.error_number,
                    severity = ?error.severity,
                    reason = %decision.reason,
                    "notification sent"
                );
                RecordOutcome::Notified
            }
            Err(e) => {
                metrics::counter!(m::NOTIFY_FAILED_TOTAL).increment(1);
                tracing::warn!(
                    error_number = error.error_number,
                    error = %e,
                    "notification delivery failed"
                );
                RecordOutcome::NotifyFailed
            }
        }
    }

    fn fail_batch(&self, err: &LogPipelineError) -> InvocationResult {
        metrics::counter!(m::BATCHES_FAILED_TOTAL).increment(1);
        tracing::error!(
            stage = BatchStage::BatchFailed.as_str(),
            error = %err,
            "batch decode failed"
        );
        InvocationResult::batch_failed(err.to_string())
    }
}
