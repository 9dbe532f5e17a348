//! 중복 제거 저장소 -- 에러 번호별 마지막 알림 시각으로 쿨다운을 판정합니다.
//!
//! 저장소는 파티션 키 `errorNumber`, 정렬 키 `timestamp`(ms), 만료 속성
//! `expiryEpochSeconds`(s)를 갖는 테이블로 모델링됩니다. 저장소 자체는 기록을
//! 막지 않으며, 언제 기록할지는 오케스트레이터가 결정합니다.
//!
//! # 쿨다운 판정
//! - 기록 없음 -> `FirstOccurrence`
//! - 마지막 기록 `<= now - cooldown` -> `CooldownExpired` (경계값 포함)
//! - 그 외 -> `WithinCooldown`
//!
//! # 백엔드
//! - [`MemoryDedupStore`]: 프로세스 내 공유 맵 (테스트 및 단일 프로세스용)
//! - [`FileDedupStore`]: 데이터 디렉토리의 테이블별 JSON 문서

pub mod file;
pub mod memory;

pub use file::FileDedupStore;
pub use memory::MemoryDedupStore;

use std::future::Future;

use sqlsentinel_core::types::{CooldownDecision, DedupEntry};

use crate::error::LogPipelineError;

/// 분 단위 쿨다운을 밀리초로 변환합니다.
pub fn cooldown_millis(cooldown_minutes: u32) -> i64 {
    i64::from(cooldown_minutes) * 60_000
}

/// 가장 최근 기록과 현재 시각으로 쿨다운을 판정합니다.
pub fn evaluate(latest: Option<&DedupEntry>, now_millis: i64, cooldown_minutes: u32) -> CooldownDecision {
    match latest {
        None => CooldownDecision::first_occurrence(),
        Some(entry) if entry.timestamp_millis <= now_millis - cooldown_millis(cooldown_minutes) => {
            CooldownDecision::cooldown_expired()
        }
        Some(_) => CooldownDecision::within_cooldown(),
    }
}

/// 중복 제거 저장소 trait
///
/// 구현체는 `latest_entry`와 `put_entry`만 제공하면 되며,
/// 판정(`decide`)과 기록(`record`)은 기본 구현을 사용합니다.
/// 여러 호출이 동시에 같은 저장소를 사용할 수 있으며, 두 호출이 모두
/// 알림을 결정하는 좁은 경쟁 구간은 허용됩니다.
pub trait DedupStore: Send + Sync {
    /// 백엔드 이름 (로그/에러용)
    fn backend(&self) -> &'static str;

    /// 에러 번호의 가장 최근 유효 엔트리를 조회합니다.
    ///
    /// `now_millis` 기준으로 만료된 엔트리는 없는 것으로 취급합니다.
    fn latest_entry(
        &self,
        error_number: u32,
        now_millis: i64,
    ) -> impl Future<Output = Result<Option<DedupEntry>, LogPipelineError>> + Send;

    /// 엔트리를 기록합니다.
    fn put_entry(
        &self,
        entry: DedupEntry,
    ) -> impl Future<Output = Result<(), LogPipelineError>> + Send;

    /// 알림 여부를 판정합니다.
    fn decide(
        &self,
        error_number: u32,
        now_millis: i64,
        cooldown_minutes: u32,
    ) -> impl Future<Output = Result<CooldownDecision, LogPipelineError>> + Send {
        async move {
            let latest = self.latest_entry(error_number, now_millis).await?;
            Ok(evaluate(latest.as_ref(), now_millis, cooldown_minutes))
        }
    }

    /// 알림 기록을 남깁니다.
    fn record(
        &self,
        error_number: u32,
        now_millis: i64,
        ttl_hours: u32,
    ) -> impl Future<Output = Result<DedupEntry, LogPipelineError>> + Send {
        async move {
            let entry = DedupEntry::new(error_number, now_millis, ttl_hours);
            self.put_entry(entry).await?;
            Ok(entry)
        }
    }
}
