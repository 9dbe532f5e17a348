//! 현재 시각 공급자
//!
//! 쿨다운 판정의 "현재"는 이벤트 타임스탬프가 아니라 처리 시점의 벽시계입니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// epoch 밀리초 단위 현재 시각
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// 시스템 벽시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// 수동으로 조정하는 시계
///
/// `Clone`된 인스턴스끼리 같은 시각을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_millis)),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    /// 분 단위로 시각을 앞당깁니다.
    pub fn advance_minutes(&self, minutes: i64) {
        self.now.fetch_add(minutes * 60_000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
