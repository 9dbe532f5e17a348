//! 내장 추출 규칙
//!
//! 규칙은 `(이름, 정규식, 추출 함수)` 삼중항이며 등록 순서대로 시도됩니다.
//! 추출 함수가 `None`을 돌려주면 (숫자 변환 실패 등) 해당 규칙은 일치하지
//! 않은 것으로 취급되어 다음 규칙으로 넘어갑니다.

use regex::{Captures, Regex};

use crate::error::LogPipelineError;

/// 추출 함수 시그니처
pub type Extractor = fn(&Captures<'_>) -> Option<Extracted>;

/// 규칙이 추출한 필드
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub error_number: u32,
    pub severity: Option<u8>,
    pub state: Option<u8>,
    pub server: Option<String>,
    pub line: Option<u32>,
    pub message: String,
}

/// 추출 규칙
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    name: &'static str,
    regex: Regex,
    extract: Extractor,
}

impl ExtractionRule {
    /// 패턴을 컴파일하여 규칙을 생성합니다.
    pub fn new(name: &'static str, pattern: &str, extract: Extractor) -> Result<Self, LogPipelineError> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            extract,
        })
    }

    /// 규칙 이름
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 텍스트에 규칙을 적용합니다.
    pub fn apply(&self, text: &str) -> Option<Extracted> {
        let caps = self.regex.captures(text)?;
        (self.extract)(&caps)
    }
}

/// `Msg 208, Level 16, State 1, Server db01, Line 1 <message>`
pub const MSG_LEVEL: &str =
    r"Msg\s+(\d+),\s*Level\s+(\d+),\s*State\s+(\d+),\s*Server\s+([^,]+),\s*Line\s+(\d+)\s*(.*)";

/// `Error: 18456, Severity: 14, State: 8. <message>`
pub const ERROR_SEVERITY_STATE: &str =
    r"Error:\s*(\d+),\s*Severity:\s*(\d+),\s*State:\s*(\d+)[.,]?\s*(.*)";

/// `Error: 823. <message>`
pub const ERROR_NUMBER_ONLY: &str = r"Error:\s*(\d+)[.,]?\s*(.*)";

/// 기본 규칙 목록을 우선순위 순서로 생성합니다.
pub fn builtin_rules() -> Result<Vec<ExtractionRule>, LogPipelineError> {
    Ok(vec![
        ExtractionRule::new("msg_level", MSG_LEVEL, extract_msg_level)?,
        ExtractionRule::new(
            "error_severity_state",
            ERROR_SEVERITY_STATE,
            extract_error_severity_state,
        )?,
        ExtractionRule::new("error_number_only", ERROR_NUMBER_ONLY, extract_error_number_only)?,
    ])
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

fn message(caps: &Captures<'_>, idx: usize) -> String {
    caps.get(idx)
        .map(|m| m.as_str().trim().to_owned())
        .unwrap_or_default()
}

fn extract_msg_level(caps: &Captures<'_>) -> Option<Extracted> {
    Some(Extracted {
        error_number: number(caps, 1)?,
        severity: Some(number(caps, 2)?),
        state: Some(number(caps, 3)?),
        server: caps.get(4).map(|m| m.as_str().trim().to_owned()),
        line: Some(number(caps, 5)?),
        message: message(caps, 6),
    })
}

fn extract_error_severity_state(caps: &Captures<'_>) -> Option<Extracted> {
    Some(Extracted {
        error_number: number(caps, 1)?,
        severity: Some(number(caps, 2)?),
        state: Some(number(caps, 3)?),
        server: None,
        line: None,
        message: message(caps, 4),
    })
}

fn extract_error_number_only(caps: &Captures<'_>) -> Option<Extracted> {
    Some(Extracted {
        error_number: number(caps, 1)?,
        message: message(caps, 2),
        ..Extracted::default()
    })
}
