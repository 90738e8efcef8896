//! crates/cat_tales_core/src/validation.rs
//!
//! Statistical sanity checks over extracted text. All rules run
//! independently and every issue is collected — nothing short-circuits —
//! so a failed validation still returns full statistics for diagnostics.

use serde::Serialize;
use std::collections::HashSet;

/// Statistics gathered while validating a block of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStats {
    pub word_count: usize,
    pub character_count: usize,
    pub sentence_count: usize,
    pub unique_word_ratio: f64,
    pub alphanumeric_ratio: f64,
}

/// Outcome of validating extracted content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub stats: TextStats,
}

const MIN_WORDS: usize = 10;
const MIN_CHARS: usize = 50;
const MIN_ALPHANUMERIC_RATIO: f64 = 0.7;
const MIN_WORDS_PER_SENTENCE: f64 = 3.0;
const MIN_UNIQUE_WORD_RATIO: f64 = 0.3;
/// Repetition is only judged once there is enough text to judge it on.
const REPETITION_MIN_WORDS: usize = 50;

/// Validates extracted document text. Never fails; the caller decides what
/// to do with an invalid report.
pub fn validate(text: &str) -> ValidationReport {
    let stats = compute_stats(text);
    let mut issues = Vec::new();

    if stats.word_count < MIN_WORDS {
        issues.push(format!(
            "too few words extracted ({} < {MIN_WORDS})",
            stats.word_count
        ));
    }
    if stats.character_count < MIN_CHARS {
        issues.push(format!(
            "extracted content too short ({} < {MIN_CHARS} characters)",
            stats.character_count
        ));
    }
    if stats.character_count > 0 && stats.alphanumeric_ratio < MIN_ALPHANUMERIC_RATIO {
        issues.push(format!(
            "low alphanumeric ratio ({:.2}); possible encoding or special-character anomaly",
            stats.alphanumeric_ratio
        ));
    }
    if stats.sentence_count > 0 {
        let words_per_sentence = stats.word_count as f64 / stats.sentence_count as f64;
        if words_per_sentence < MIN_WORDS_PER_SENTENCE {
            issues.push(format!(
                "fragmented sentence structure ({words_per_sentence:.1} words per sentence)"
            ));
        }
    }
    if stats.word_count > REPETITION_MIN_WORDS && stats.unique_word_ratio < MIN_UNIQUE_WORD_RATIO {
        issues.push(format!(
            "excessive repetition (unique word ratio {:.2})",
            stats.unique_word_ratio
        ));
    }

    ValidationReport {
        valid: issues.is_empty(),
        issues,
        stats,
    }
}

fn compute_stats(text: &str) -> TextStats {
    let words: Vec<&str> = text.split_whitespace().collect();
    let word_count = words.len();
    let character_count = text.chars().count();

    let sentence_count = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();

    let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let unique_word_ratio = if word_count > 0 {
        unique.len() as f64 / word_count as f64
    } else {
        0.0
    };

    let alphanumeric = text.chars().filter(|c| c.is_ascii_alphanumeric()).count();
    let alphanumeric_ratio = if character_count > 0 {
        alphanumeric as f64 / character_count as f64
    } else {
        0.0
    };

    TextStats {
        word_count,
        character_count,
        sentence_count,
        unique_word_ratio,
        alphanumeric_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_prose_passes() {
        let text = "The mitochondria is the powerhouse of the cell. It converts \
                    nutrients into energy through respiration. Plants instead rely \
                    on chloroplasts for photosynthesis during daylight hours.";
        let report = validate(text);
        assert!(report.valid, "issues: {:?}", report.issues);
        assert!(report.stats.word_count >= 10);
    }

    #[test]
    fn forty_character_text_is_too_short() {
        // Scenario: a scanned PDF yielding almost nothing.
        let text = "Lorem ipsum dolor sit amet, consectetu"; // 38 chars
        let report = validate(text);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("too short")));
        assert!(report.issues.iter().any(|i| i.contains("too few words")));
        // Stats still populated for diagnostics.
        assert_eq!(report.stats.character_count, text.chars().count());
    }

    #[test]
    fn garbage_encoding_is_flagged() {
        let text = "�����♦♦♦ ��� ☺☺ ����� ♦♦ ����� ☺ ���� ♦♦♦ ����� ☺☺ ���� ♦ �����";
        let report = validate(text);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("alphanumeric")), "issues: {:?}", report.issues);
    }

    #[test]
    fn fragmented_structure_is_flagged() {
        let text = "One two. Three go. Ok yes. No sir. Hm ah. So it. Be do. Is at. Up we. Go on.";
        let report = validate(text);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("fragmented")), "issues: {:?}", report.issues);
    }

    #[test]
    fn repetition_needs_enough_words_to_trigger() {
        let wall = "cat ".repeat(200);
        let report = validate(&wall);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("repetition")), "issues: {:?}", report.issues);

        // The same repetition under 50 words is not judged.
        let short = "cat ".repeat(20);
        let report = validate(&short);
        assert!(!report.issues.iter().any(|i| i.contains("repetition")));
    }

    #[test]
    fn empty_input_reports_all_stats() {
        let report = validate("");
        assert!(!report.valid);
        assert_eq!(report.stats.word_count, 0);
        assert_eq!(report.stats.character_count, 0);
        assert_eq!(report.stats.sentence_count, 0);
        assert_eq!(report.stats.unique_word_ratio, 0.0);
        assert_eq!(report.stats.alphanumeric_ratio, 0.0);
    }
}
