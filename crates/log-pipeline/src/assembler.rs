//! 멀티라인 에러 조립기 -- 여러 물리 라인으로 나뉜 에러를 하나로 묶습니다.
//!
//! SQL Server는 에러 하나를 헤더 라인과 설명 라인으로 나누어 기록합니다:
//!
//! ```text
//! 2024-01-15 12:00:00.12 Logon  Error: 18456, Severity: 14, State: 8.
//! 2024-01-15 12:00:00.12 Logon  Login failed for user 'sa'. Reason: Password did not match.
//! ```
//!
//! # 조립 규칙
//! - 에러 번호 토큰(`Error: <n>`, `Msg <n>, Level <n>`)이 있는 헤더 라인이 새 후보를 시작
//! - 헤더가 아닌 라인은 열린 후보에 덧붙음
//! - 연속된 헤더는 각각 별도 후보 (병합하지 않음)
//! - 정보성 노이즈 라인은 열린 후보를 닫고 단독 후보로 방출
//! - 다른 소스 스트림의 라인이나 최대 라인 수를 넘는 라인은 새 후보를 시작
//! - 열린 후보가 없을 때의 비헤더 라인은 단독 후보로 방출 (파서가 분류)
//!
//! 결과는 지연 평가되는 일회성 이터레이터([`Assembled`])입니다.

use regex::Regex;

use sqlsentinel_core::types::{ErrorRecordCandidate, LogLine};

use crate::error::LogPipelineError;
use crate::filter::NoiseMatcher;

/// 에러 헤더 패턴 (에러 번호 토큰)
const HEADER_PATTERN: &str = r"\bError:\s*\d+|\bMsg\s+\d+,\s*Level\s+\d+";

/// 라인 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// 새 에러 레코드 시작
    Header,
    /// 이전 레코드의 연속 라인
    Continuation,
    /// 관련 없는 정보성 라인
    Noise,
}

/// 멀티라인 에러 조립기
#[derive(Debug, Clone)]
pub struct ErrorRecordAssembler {
    header: Regex,
    noise: NoiseMatcher,
    max_lines_per_record: usize,
}

impl ErrorRecordAssembler {
    /// 노이즈 매처와 레코드당 최대 라인 수로 조립기를 생성합니다.
    pub fn new(noise: NoiseMatcher, max_lines_per_record: usize) -> Result<Self, LogPipelineError> {
        if max_lines_per_record == 0 {
            return Err(LogPipelineError::Config {
                field: "assembler.max_lines_per_record".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(Self {
            header: Regex::new(HEADER_PATTERN)?,
            noise,
            max_lines_per_record,
        })
    }

    /// 라인을 분류합니다. 노이즈 판정이 헤더 판정보다 우선합니다.
    pub fn classify(&self, text: &str) -> LineKind {
        if self.noise.is_match(text) {
            LineKind::Noise
        } else if self.header.is_match(text) {
            LineKind::Header
        } else {
            LineKind::Continuation
        }
    }

    /// 라인 시퀀스를 에러 레코드 후보 시퀀스로 조립합니다.
    pub fn assemble<I>(&self, lines: I) -> Assembled<'_, I::IntoIter>
    where
        I: IntoIterator<Item = LogLine>,
    {
        Assembled {
            assembler: self,
            lines: lines.into_iter(),
            current: None,
            pending: None,
        }
    }
}

/// 조립 이터레이터
///
/// 입력 순서대로 후보를 방출하며 한 번만 순회할 수 있습니다.
pub struct Assembled<'a, I> {
    assembler: &'a ErrorRecordAssembler,
    lines: I,
    /// 조립 중인 후보
    current: Option<ErrorRecordCandidate>,
    /// 다음 호출에서 방출할 후보 (노이즈 라인)
    pending: Option<ErrorRecordCandidate>,
}

impl<I> Iterator for Assembled<'_, I>
where
    I: Iterator<Item = LogLine>,
{
    type Item = ErrorRecordCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pending) = self.pending.take() {
            return Some(pending);
        }

        loop {
            let Some(line) = self.lines.next() else {
                // 배치 끝: 열린 후보 방출
                return self.current.take();
            };

            match self.assembler.classify(&line.raw_text) {
                LineKind::Header => {
                    let previous = self.current.replace(ErrorRecordCandidate::start(line));
                    if previous.is_some() {
                        return previous;
                    }
                }
                LineKind::Noise => {
                    let single = ErrorRecordCandidate::start(line);
                    return match self.current.take() {
                        Some(previous) => {
                            self.pending = Some(single);
                            Some(previous)
                        }
                        None => Some(single),
                    };
                }
                LineKind::Continuation => match self.current.as_mut() {
                    Some(current)
                        if current.source_stream() == line.source_stream
                            && current.len() < self.assembler.max_lines_per_record =>
                    {
                        current.push(line);
                    }
                    Some(_) => {
                        return self.current.replace(ErrorRecordCandidate::start(line));
                    }
                    None => return Some(ErrorRecordCandidate::start(line)),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlsentinel_core::config::DEFAULT_NOISE_PATTERNS;

    fn assembler() -> ErrorRecordAssembler {
        ErrorRecordAssembler::new(NoiseMatcher::new(DEFAULT_NOISE_PATTERNS).unwrap(), 16).unwrap()
    }

    fn line(ts: i64, text: &str) -> LogLine {
        LogLine::new("prod-sql", ts, text)
    }

    fn texts(candidate: &ErrorRecordCandidate) -> Vec<&str> {
        candidate.lines.iter().map(|l| l.raw_text.as_str()).collect()
    }

    #[test]
    fn header_with_continuations_forms_one_candidate() {
        let lines = vec![
            line(1, "2024-01-15 12:00:00.12 Logon  Error: 18456, Severity: 14, State: 8."),
            line(2, "2024-01-15 12:00:00.12 Logon  Login failed for user 'sa'."),
            line(3, "2024-01-15 12:00:00.12 Logon  Reason: Password did not match."),
        ];
        let candidates: Vec<_> = assembler().assemble(lines).collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].len(), 3);
        assert_eq!(candidates[0].start_timestamp, 1);
        assert!(texts(&candidates[0])[2].contains("Reason"));
    }

    #[test]
    fn header_followed_by_n_lines_keeps_order() {
        for n in 0..5 {
            let mut lines = vec![line(0, "Error: 823, Severity: 24, State: 2.")];
            lines.extend((1..=n).map(|i| line(i, &format!("detail {i}"))));
            let candidates: Vec<_> = assembler().assemble(lines).collect();

            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].len(), n as usize + 1);
            for (idx, l) in candidates[0].lines.iter().enumerate() {
                assert_eq!(l.timestamp_millis, idx as i64);
            }
        }
    }

    #[test]
    fn consecutive_headers_are_not_merged() {
        let lines = vec![
            line(1, "Error: 18456, Severity: 14, State: 8."),
            line(2, "Error: 17806, Severity: 20, State: 14."),
        ];
        let candidates: Vec<_> = assembler().assemble(lines).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].len(), 1);
        assert_eq!(candidates[1].len(), 1);
        assert_eq!(candidates[1].start_timestamp, 2);
    }

    #[test]
    fn msg_level_format_is_a_header() {
        assert_eq!(
            assembler().classify("Msg 208, Level 16, State 1, Server db01, Line 1 Invalid object name 'dbo.T'."),
            LineKind::Header
        );
    }

    #[test]
    fn orphan_line_before_header_is_emitted_alone() {
        let lines = vec![
            line(1, "Starting up database 'tempdb'."),
            line(2, "Error: 9002, Severity: 17, State: 2."),
            line(3, "The transaction log for database 'app' is full."),
        ];
        let candidates: Vec<_> = assembler().assemble(lines).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(texts(&candidates[0]), vec!["Starting up database 'tempdb'."]);
        assert_eq!(candidates[1].len(), 2);
    }

    #[test]
    fn noise_line_closes_candidate_and_is_emitted_alone() {
        let lines = vec![
            line(1, "Error: 18456, Severity: 14, State: 8."),
            line(2, "This is an informational message only; no user action is required."),
            line(3, "Login failed for user 'app'."),
        ];
        let candidates: Vec<_> = assembler().assemble(lines).collect();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].len(), 1);
        assert!(texts(&candidates[1])[0].contains("informational"));
        assert_eq!(candidates[2].len(), 1);
    }

    #[test]
    fn different_stream_starts_new_candidate() {
        let lines = vec![
            LogLine::new("a", 1, "Error: 1205, Severity: 13, State: 51."),
            LogLine::new("b", 2, "Transaction was deadlocked."),
        ];
        let candidates: Vec<_> = assembler().assemble(lines).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].source_stream(), "b");
    }

    #[test]
    fn max_lines_per_record_bounds_candidate() {
        let assembler = ErrorRecordAssembler::new(NoiseMatcher::empty(), 2).unwrap();
        let lines = vec![
            line(1, "Error: 1, Severity: 16, State: 1."),
            line(2, "first"),
            line(3, "second"),
            line(4, "third"),
        ];
        let candidates: Vec<_> = assembler.assemble(lines).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].len(), 2);
        assert_eq!(texts(&candidates[1]), vec!["second", "third"]);
    }

    #[test]
    fn empty_batch_yields_nothing() {
        assert_eq!(assembler().assemble(Vec::new()).count(), 0);
    }

    #[test]
    fn zero_max_lines_is_config_error() {
        let result = ErrorRecordAssembler::new(NoiseMatcher::empty(), 0);
        assert!(matches!(result, Err(LogPipelineError::Config { .. })));
    }
}
