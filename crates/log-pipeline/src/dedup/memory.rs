//! 인메모리 중복 제거 저장소
//!
//! `Clone`된 인스턴스끼리 같은 맵을 공유합니다. 만료는 조회 시점에 논리적으로
//! 적용되며, 테스트를 위해 조회/기록 실패를 주입할 수 있습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::RwLock;

use sqlsentinel_core::types::DedupEntry;

use super::DedupStore;
use crate::error::LogPipelineError;

const BACKEND: &str = "memory";

/// 인메모리 저장소
#[derive(Debug, Clone, Default)]
pub struct MemoryDedupStore {
    data: Arc<RwLock<HashMap<u32, Vec<DedupEntry>>>>,
    fail_lookups: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이후 조회가 실패하도록 설정합니다.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// 이후 기록이 실패하도록 설정합니다.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 성공한 기록 횟수
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// 저장된 모든 엔트리 (에러 번호, 시각 순)
    pub async fn entries(&self) -> Vec<DedupEntry> {
        let data = self.data.read().await;
        let mut all: Vec<DedupEntry> = data.values().flatten().copied().collect();
        all.sort_by_key(|e| (e.error_number, e.timestamp_millis));
        all
    }
}

impl DedupStore for MemoryDedupStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn latest_entry(
        &self,
        error_number: u32,
        now_millis: i64,
    ) -> Result<Option<DedupEntry>, LogPipelineError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(LogPipelineError::Store {
                backend: BACKEND.to_owned(),
                reason: "lookup failure injected".to_owned(),
            });
        }

        let data = self.data.read().await;
        Ok(data.get(&error_number).and_then(|entries| {
            entries
                .iter()
                .filter(|e| !e.is_expired_at(now_millis))
                .max_by_key(|e| e.timestamp_millis)
                .copied()
        }))
    }

    async fn put_entry(&self, entry: DedupEntry) -> Result<(), LogPipelineError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LogPipelineError::Store {
                backend: BACKEND.to_owned(),
                reason: "write failure injected".to_owned(),
            });
        }

        let mut data = self.data.write().await;
        data.entry(entry.error_number).or_default().push(entry);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
