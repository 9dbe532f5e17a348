//! 에러 파서 -- 조립된 후보를 [`StructuredError`]로 변환합니다.
//!
//! 각 라인에서 SQL Server 타임스탬프와 프로세스 토큰(`spid52`, `Logon` 등)을
//! 제거한 뒤 공백 하나로 이어 붙이고, 등록된 추출 규칙을 순서대로 적용합니다.
//! 처음 일치한 규칙의 결과를 사용하며, 모든 규칙이 실패하면
//! [`ParseOutcome::Unparseable`]을 반환합니다. 이는 에러가 아닙니다.
//!
//! # 사용 예시
//! ```
//! use sqlsentinel_core::types::{ErrorRecordCandidate, LogLine};
//! use sqlsentinel_log_pipeline::parser::ErrorParser;
//!
//! let parser = ErrorParser::with_builtin_rules().unwrap();
//! let candidate = ErrorRecordCandidate::start(LogLine::new(
//!     "sql01",
//!     0,
//!     "2024-01-15 12:00:00.12 Logon  Error: 18456, Severity: 14, State: 8.",
//! ));
//! let error = parser.parse(&candidate).into_parsed().unwrap();
//! assert_eq!(error.error_number, 18456);
//! ```

pub mod rules;

pub use rules::{ExtractionRule, Extracted, builtin_rules};

use regex::Regex;

use sqlsentinel_core::types::{ErrorRecordCandidate, StructuredError};

use crate::error::LogPipelineError;

/// 라인 앞의 SQL Server 타임스탬프
const LINE_TIMESTAMP: &str = r"^\s*(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d+)\s*";

/// 타임스탬프 뒤의 프로세스 토큰
const PROCESS_TOKEN: &str = r"^(spid\d+s?|Logon|Server|Backup)\s+";

/// 파싱 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// 규칙 일치
    Parsed(StructuredError),
    /// 일치하는 규칙 없음
    Unparseable,
}

impl ParseOutcome {
    /// 파싱 성공 시 구조화 에러를 반환합니다.
    pub fn into_parsed(self) -> Option<StructuredError> {
        match self {
            Self::Parsed(error) => Some(error),
            Self::Unparseable => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

/// 규칙 기반 에러 파서
#[derive(Debug, Clone)]
pub struct ErrorParser {
    rules: Vec<ExtractionRule>,
    timestamp: Regex,
    process: Regex,
}

impl ErrorParser {
    /// 주어진 규칙 목록으로 파서를 생성합니다. 순서가 우선순위입니다.
    pub fn new(rules: Vec<ExtractionRule>) -> Result<Self, LogPipelineError> {
        Ok(Self {
            rules,
            timestamp: Regex::new(LINE_TIMESTAMP)?,
            process: Regex::new(PROCESS_TOKEN)?,
        })
    }

    /// 내장 규칙으로 파서를 생성합니다.
    pub fn with_builtin_rules() -> Result<Self, LogPipelineError> {
        Self::new(builtin_rules()?)
    }

    /// 등록된 규칙 이름 목록
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(ExtractionRule::name).collect()
    }

    /// 후보 하나를 파싱합니다.
    pub fn parse(&self, candidate: &ErrorRecordCandidate) -> ParseOutcome {
        let mut log_timestamp = None;
        let mut parts = Vec::with_capacity(candidate.len());

        for line in &candidate.lines {
            let mut text = line.raw_text.as_str();
            if let Some(caps) = self.timestamp.captures(text) {
                if log_timestamp.is_none() {
                    log_timestamp = caps.get(1).map(|m| m.as_str().to_owned());
                }
                text = &text[caps.get(0).map_or(0, |m| m.end())..];
            }
            if let Some(m) = self.process.find(text) {
                text = &text[m.end()..];
            }
            parts.push(text);
        }

        let joined = parts
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");

        for rule in &self.rules {
            if let Some(extracted) = rule.apply(&joined) {
                return ParseOutcome::Parsed(StructuredError {
                    error_number: extracted.error_number,
                    severity: extracted.severity,
                    state: extracted.state,
                    message: extracted.message,
                    timestamp_millis: candidate.start_timestamp,
                    server: extracted.server,
                    line: extracted.line,
                    log_timestamp,
                    source_stream: candidate.source_stream().to_owned(),
                    rule: rule.name().to_owned(),
                });
            }
        }

        tracing::trace!(lines = candidate.len(), "no extraction rule matched");
        ParseOutcome::Unparseable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlsentinel_core::types::LogLine;

    fn parser() -> ErrorParser {
        ErrorParser::with_builtin_rules().unwrap()
    }

    fn candidate(lines: &[&str]) -> ErrorRecordCandidate {
        let mut iter = lines
            .iter()
            .enumerate()
            .map(|(i, text)| LogLine::new("sql-prod", 1_000 + i as i64, *text));
        let mut candidate = ErrorRecordCandidate::start(iter.next().unwrap());
        for line in iter {
            candidate.push(line);
        }
        candidate
    }

    #[test]
    fn parses_multiline_login_failure() {
        let outcome = parser().parse(&candidate(&[
            "2024-01-15 12:00:00.12 Logon       Error: 18456, Severity: 14, State: 8.",
            "2024-01-15 12:00:00.12 Logon       Login failed for user 'sa'. Reason: Password did not match. [CLIENT: 10.0.0.5]",
        ]));
        let error = outcome.into_parsed().unwrap();

        assert_eq!(error.error_number, 18456);
        assert_eq!(error.severity, Some(14));
        assert_eq!(error.state, Some(8));
        assert_eq!(
            error.message,
            "Login failed for user 'sa'. Reason: Password did not match. [CLIENT: 10.0.0.5]"
        );
        assert_eq!(error.timestamp_millis, 1_000);
        assert_eq!(error.log_timestamp.as_deref(), Some("2024-01-15 12:00:00.12"));
        assert_eq!(error.source_stream, "sql-prod");
        assert_eq!(error.rule, "error_severity_state");
    }

    #[test]
    fn strips_spid_token() {
        let error = parser()
            .parse(&candidate(&[
                "2024-01-15 03:10:44.51 spid51s     Error: 9002, Severity: 17, State: 2.",
                "2024-01-15 03:10:44.51 spid51s     The transaction log for database 'app' is full.",
            ]))
            .into_parsed()
            .unwrap();
        assert_eq!(error.message, "The transaction log for database 'app' is full.");
    }

    #[test]
    fn msg_level_rule_wins_over_error_rules() {
        let error = parser()
            .parse(&candidate(&[
                "Msg 208, Level 16, State 1, Server db01, Line 3 Invalid object name 'dbo.Orders'.",
            ]))
            .into_parsed()
            .unwrap();
        assert_eq!(error.rule, "msg_level");
        assert_eq!(error.server.as_deref(), Some("db01"));
        assert_eq!(error.line, Some(3));
        assert!(error.log_timestamp.is_none());
    }

    #[test]
    fn error_number_only_leaves_severity_absent() {
        let error = parser()
            .parse(&candidate(&["Error: 823. The operating system returned error 21."]))
            .into_parsed()
            .unwrap();
        assert_eq!(error.error_number, 823);
        assert!(error.severity.is_none());
        assert!(error.state.is_none());
        assert_eq!(error.rule, "error_number_only");
    }

    #[test]
    fn non_error_text_is_unparseable() {
        for text in [
            "Starting up database 'tempdb'.",
            "",
            "Error: not-a-number",
            "Msg abc, Level 16",
        ] {
            assert_eq!(parser().parse(&candidate(&[text])), ParseOutcome::Unparseable);
        }
    }

    #[test]
    fn overflowing_error_number_is_unparseable() {
        let outcome = parser().parse(&candidate(&["Error: 99999999999, Severity: 16, State: 1."]));
        assert_eq!(outcome, ParseOutcome::Unparseable);
    }

    #[test]
    fn overflowing_severity_falls_through_to_next_rule() {
        let error = parser()
            .parse(&candidate(&["Error: 50000, Severity: 300, State: 1. custom"]))
            .into_parsed()
            .unwrap();
        assert_eq!(error.rule, "error_number_only");
        assert!(error.severity.is_none());
    }

    #[test]
    fn parser_without_rules_never_matches() {
        let parser = ErrorParser::new(Vec::new()).unwrap();
        assert!(!parser.parse(&candidate(&["Error: 1, Severity: 1, State: 1."])).is_parsed());
        assert!(parser.rule_names().is_empty());
    }
}
