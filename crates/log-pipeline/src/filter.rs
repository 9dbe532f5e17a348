//! 노이즈 필터 -- 알림 대상이 아닌 에러를 제거합니다.
//!
//! [`MessageFilter`]는 상태가 없는 순수 판정기입니다. 같은 입력에는 항상 같은
//! 결과를 돌려주며, `false`로 판정된 레코드는 저장소에도 기록되지 않고
//! 알림도 나가지 않습니다.
//!
//! # 판정 순서
//! 1. 정보성 에러 번호 (내장 목록 + 설정 추가분)
//! 2. 최소 심각도 (심각도가 없는 레코드는 통과)
//! 3. 정보성 메시지 패턴 ([`NoiseMatcher`])

use std::collections::HashSet;

use regex::{RegexSet, RegexSetBuilder};

use sqlsentinel_core::types::StructuredError;

use crate::error::LogPipelineError;

/// 알림하지 않는 정보성 에러 번호
///
/// 백업 완료, DBCC 결과, 로그인 성공, I/O freeze/resume 등
/// 운영 중 정상적으로 기록되는 메시지입니다.
pub const BUILTIN_IGNORED_ERROR_NUMBERS: &[u32] = &[
    2528,  // DBCC execution completed
    3014,  // BACKUP/RESTORE successfully processed pages
    3197,  // I/O is frozen on database
    3198,  // I/O was resumed on database
    3262,  // The backup set on file is valid
    4035,  // Processed pages for database
    8957,  // DBCC CHECKDB found errors summary
    17137, // Starting up database
    18264, // Database backed up
    18265, // Log was backed up
    18453, // Login succeeded (trusted)
    18454, // Login succeeded (SQL auth)
];

/// 정보성 메시지 패턴 매처 (대소문자 무시)
///
/// 필터와 멀티라인 조립기가 함께 사용합니다.
#[derive(Debug, Clone)]
pub struct NoiseMatcher {
    set: RegexSet,
}

impl NoiseMatcher {
    /// 패턴 목록을 컴파일합니다.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, LogPipelineError> {
        let set = RegexSetBuilder::new(patterns.iter().map(|p| -> &str { p.as_ref() }))
            .case_insensitive(true)
            .build()?;
        Ok(Self { set })
    }

    /// 패턴이 없는 매처를 생성합니다.
    pub fn empty() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    /// 텍스트가 정보성 패턴 중 하나와 일치하는지 확인합니다.
    pub fn is_match(&self, text: &str) -> bool {
        self.set.is_match(text)
    }

    /// 등록된 패턴 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// 패턴이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// 필터 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// 알림 대상
    Keep,
    /// 정보성 에러 번호
    IgnoredNumber,
    /// 최소 심각도 미만
    BelowSeverityFloor,
    /// 정보성 메시지 패턴 일치
    Noise,
}

impl FilterVerdict {
    /// 로그용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::IgnoredNumber => "ignored_number",
            Self::BelowSeverityFloor => "below_severity_floor",
            Self::Noise => "noise",
        }
    }
}

/// 메시지 필터
#[derive(Debug, Clone)]
pub struct MessageFilter {
    ignored_numbers: HashSet<u32>,
    min_severity: Option<u8>,
    noise: NoiseMatcher,
}

impl MessageFilter {
    /// 추가 무시 번호, 최소 심각도, 노이즈 매처로 필터를 생성합니다.
    ///
    /// 내장 정보성 번호 목록은 항상 포함됩니다.
    pub fn new(extra_ignored: &[u32], min_severity: Option<u8>, noise: NoiseMatcher) -> Self {
        let ignored_numbers = BUILTIN_IGNORED_ERROR_NUMBERS
            .iter()
            .chain(extra_ignored)
            .copied()
            .collect();
        Self {
            ignored_numbers,
            min_severity,
            noise,
        }
    }

    /// 레코드에 대한 판정 결과를 반환합니다.
    pub fn verdict(&self, error: &StructuredError) -> FilterVerdict {
        if self.ignored_numbers.contains(&error.error_number) {
            return FilterVerdict::IgnoredNumber;
        }

        if let (Some(floor), Some(severity)) = (self.min_severity, error.severity)
            && severity < floor
        {
            return FilterVerdict::BelowSeverityFloor;
        }

        if self.noise.is_match(&error.message) {
            return FilterVerdict::Noise;
        }

        FilterVerdict::Keep
    }

    /// 알림 파이프라인에 남길지 판정합니다.
    pub fn should_alert(&self, error: &StructuredError) -> bool {
        self.verdict(error) == FilterVerdict::Keep
    }

    /// 에러 번호가 무시 목록에 있는지 확인합니다.
    pub fn is_ignored_number(&self, error_number: u32) -> bool {
        self.ignored_numbers.contains(&error_number)
    }
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::new(&[], None, NoiseMatcher::empty())
    }
}
