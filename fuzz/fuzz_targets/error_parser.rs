#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlsentinel_core::config::DEFAULT_NOISE_PATTERNS;
use sqlsentinel_core::types::LogLine;
use sqlsentinel_log_pipeline::{ErrorParser, ErrorRecordAssembler, NoiseMatcher, ParseOutcome};

#[derive(Debug, Arbitrary)]
struct FuzzBatch {
    lines: Vec<(bool, i64, String)>,
}

fuzz_target!(|batch: FuzzBatch| {
    let Ok(noise) = NoiseMatcher::new(DEFAULT_NOISE_PATTERNS) else {
        return;
    };
    let Ok(assembler) = ErrorRecordAssembler::new(noise, 16) else {
        return;
    };
    let Ok(parser) = ErrorParser::with_builtin_rules() else {
        return;
    };

    let lines = batch
        .lines
        .into_iter()
        .map(|(alt, ts, text)| LogLine::new(if alt { "b" } else { "a" }, ts, text));

    for candidate in assembler.assemble(lines) {
        assert!(!candidate.is_empty());
        assert!(candidate.len() <= 16);
        if let ParseOutcome::Parsed(error) = parser.parse(&candidate) {
            assert_eq!(error.timestamp_millis, candidate.start_timestamp);
        }
    }
});
