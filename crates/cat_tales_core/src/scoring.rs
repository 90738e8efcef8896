//! crates/cat_tales_core/src/scoring.rs
//!
//! Heuristic quality scores for generated cat stories. Pure functions, no
//! external calls; every score is deterministic over the text and clamped
//! to its documented range. The accuracy score is a naive word-overlap
//! proxy kept for reproducibility, not a factual check.

use crate::domain::{reading_minutes, Complexity, QualityMetrics};
use std::collections::HashSet;

/// Cat-theme vocabulary. Used by readability (bonus) and theme consistency.
const THEME_WORDS: &[&str] = &[
    "cat", "cats", "kitten", "kittens", "kitty", "feline", "paw", "paws", "whisker", "whiskers",
    "purr", "purred", "purring", "meow", "meowed", "tail", "fur", "furry", "pounce", "pounced",
    "claw", "claws", "nap", "yarn", "mouse", "mice",
];

/// Words that tend to signal an engaging narrative voice.
const ENGAGEMENT_WORDS: &[&str] = &[
    "adventure", "amazing", "wonder", "wonderful", "curious", "exciting", "excited", "discover",
    "discovered", "explore", "explored", "magical", "mystery", "mysterious", "surprise",
    "surprised", "journey", "secret", "brave", "daring",
];

/// Discourse connectives counted for coherence.
const CONNECTIVES: &[&str] = &[
    "first", "then", "next", "finally", "meanwhile", "however", "therefore", "because",
];

/// Vocabulary that suggests creative framing.
const CREATIVE_WORDS: &[&str] = &[
    "imagine", "dream", "dreamed", "magic", "magical", "enchanted", "kingdom", "quest", "hero",
    "legend", "tale", "wondrous", "marvelous", "extraordinary",
];

/// Stock narrative scenarios; a phrase match is worth two word hits.
const SCENARIO_PHRASES: &[&str] = &[
    "once upon a time",
    "one sunny morning",
    "in a faraway land",
    "happily ever after",
    "one day",
];

/// Vocabulary that suggests the story is actually teaching something.
const EDUCATIONAL_WORDS: &[&str] = &[
    "learn", "learned", "learning", "understand", "understood", "explain", "explained",
    "because", "means", "example", "important", "remember", "discover", "knowledge", "practice",
];

fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn count_hits(text_words: &[String], vocabulary: &[&str]) -> usize {
    text_words
        .iter()
        .filter(|w| vocabulary.contains(&w.as_str()))
        .count()
}

fn avg_words_per_sentence(text: &str) -> Option<f64> {
    let sentence_count = sentences(text).len();
    if sentence_count == 0 {
        return None;
    }
    Some(words(text).len() as f64 / sentence_count as f64)
}

//=========================================================================================
// Individual scores
//=========================================================================================

/// Readability on a 1–10 scale, anchored by the requested complexity and
/// adjusted for sentence length and theme vocabulary. No sentences → 5.
pub fn readability(text: &str, complexity: Complexity) -> i16 {
    let Some(avg) = avg_words_per_sentence(text) else {
        return 5;
    };
    let mut score: i16 = match complexity {
        Complexity::Basic => 9,
        Complexity::Intermediate => 7,
        Complexity::Advanced => 5,
    };
    if avg > 20.0 {
        score -= 2;
    } else if avg > 15.0 {
        score -= 1;
    } else if avg < 8.0 {
        score += 1;
    }
    if count_hits(&words(text), THEME_WORDS) > 5 {
        score += 1;
    }
    score.clamp(1, 10)
}

/// Discourse-connective density normalized against one connective per three
/// sentences. Base 0.7, floor 0.3, cap 1.0. No sentences → 0.5.
pub fn coherence(text: &str) -> f64 {
    let sentence_count = sentences(text).len();
    if sentence_count == 0 {
        return 0.5;
    }
    let connective_count = count_hits(&words(text), CONNECTIVES) as f64;
    let expected = (sentence_count as f64 / 3.0).max(1.0);
    let ratio = (connective_count / expected).min(1.0);
    (0.7 + ratio * 0.3).clamp(0.3, 1.0)
}

/// Engagement-word frequency, ×20. Floor 0.4, cap 1.0. No words → 0.5.
pub fn engagement(text: &str) -> f64 {
    let text_words = words(text);
    if text_words.is_empty() {
        return 0.5;
    }
    let hits = count_hits(&text_words, ENGAGEMENT_WORDS) as f64;
    let score = hits / text_words.len() as f64 * 20.0;
    score.clamp(0.4, 1.0)
}

/// Distinct-word overlap between the story and its source, ×2. Floor 0.6,
/// cap 1.0. A weak proxy for factual accuracy, kept for reproducibility.
pub fn accuracy(story: &str, source: &str) -> f64 {
    let source_words: HashSet<String> = words(source).into_iter().collect();
    if source_words.is_empty() {
        return 0.6;
    }
    let story_words: HashSet<String> = words(story).into_iter().collect();
    let common = story_words.intersection(&source_words).count() as f64;
    let overlap = common / source_words.len() as f64;
    (overlap * 2.0).clamp(0.6, 1.0)
}

/// Creative-word hits plus double-weighted scenario phrases, /10.
/// Floor 0.3, cap 1.0.
pub fn creativity(text: &str) -> f64 {
    let word_hits = count_hits(&words(text), CREATIVE_WORDS) as f64;
    let lower = text.to_lowercase();
    let scenario_hits = SCENARIO_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .count() as f64;
    let score = (word_hits + 2.0 * scenario_hits) / 10.0;
    score.clamp(0.3, 1.0)
}

/// Cat-theme keyword density, ×15. Floor 0.4, cap 1.0. No words → 0.5.
pub fn theme_consistency(text: &str) -> f64 {
    let text_words = words(text);
    if text_words.is_empty() {
        return 0.5;
    }
    let hits = count_hits(&text_words, THEME_WORDS) as f64;
    let score = hits / text_words.len() as f64 * 15.0;
    score.clamp(0.4, 1.0)
}

/// Educational-word hits plus double-weighted mentions of the extracted key
/// concepts, /15. Floor 0.5, cap 1.0.
pub fn educational_value(text: &str, key_concepts: &[String]) -> f64 {
    let word_hits = count_hits(&words(text), EDUCATIONAL_WORDS) as f64;
    let lower = text.to_lowercase();
    let concept_hits = key_concepts
        .iter()
        .filter(|c| !c.trim().is_empty() && lower.contains(&c.to_lowercase()))
        .count() as f64;
    let score = (word_hits + 2.0 * concept_hits) / 15.0;
    score.clamp(0.5, 1.0)
}

/// How close average sentence length sits to the expected length for the
/// complexity level (basic 8, intermediate 12, advanced 16 words).
/// Floor 0.3, cap 1.0. No sentences → 0.5.
pub fn language_simplicity(text: &str, complexity: Complexity) -> f64 {
    let Some(avg) = avg_words_per_sentence(text) else {
        return 0.5;
    };
    let expected = match complexity {
        Complexity::Basic => 8.0,
        Complexity::Intermediate => 12.0,
        Complexity::Advanced => 16.0,
    };
    let score = 1.0 - (avg - expected).abs() / expected;
    score.clamp(0.3, 1.0)
}

/// Computes the full metric set persisted with a completed simplification.
pub fn quality_metrics(
    story: &str,
    source: &str,
    key_concepts: &[String],
    complexity: Complexity,
) -> QualityMetrics {
    let word_count = story.split_whitespace().count();
    QualityMetrics {
        coherence: coherence(story),
        engagement: engagement(story),
        accuracy: accuracy(story, source),
        creativity: creativity(story),
        theme_consistency: theme_consistency(story),
        educational_value: educational_value(story, key_concepts),
        language_simplicity: language_simplicity(story, complexity),
        word_count,
        reading_minutes: reading_minutes(word_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_STORY: &str = "Whiskers was a small cat. She saw a red ball. \
        The ball rolled away. Whiskers chased the ball. Then she took a nap. \
        Her paws were tired. The kitten purred softly. Next she found her yarn.";

    #[test]
    fn basic_short_sentences_score_high_readability() {
        // avg words/sentence is well under 8 and there are theme words.
        let score = readability(SIMPLE_STORY, Complexity::Basic);
        assert!((9..=10).contains(&score), "got {score}");
    }

    #[test]
    fn long_sentences_drag_readability_down() {
        let rambling = "The cat which had been sitting on the windowsill for most \
            of the afternoon decided that the time had finally come to investigate \
            the curious noise emanating from the kitchen downstairs where dinner \
            was presumably being prepared by someone.";
        let score = readability(rambling, Complexity::Advanced);
        assert!(score <= 4, "got {score}");
    }

    #[test]
    fn empty_text_short_circuits_everywhere() {
        assert_eq!(readability("", Complexity::Basic), 5);
        assert_eq!(coherence(""), 0.5);
        assert_eq!(engagement(""), 0.5);
        assert_eq!(theme_consistency(""), 0.5);
        assert_eq!(language_simplicity("", Complexity::Basic), 0.5);
        assert_eq!(accuracy("", ""), 0.6);
        // Floors still hold for empty input on the remaining scores.
        assert_eq!(creativity(""), 0.3);
        assert_eq!(educational_value("", &[]), 0.5);
    }

    #[test]
    fn scores_stay_clamped_for_adversarial_inputs() {
        let single = "cat";
        let wall = "cat ".repeat(10_000);
        let connective_soup = "then then then. then then then. then then then.";

        for text in [single, wall.as_str(), connective_soup] {
            for complexity in [Complexity::Basic, Complexity::Intermediate, Complexity::Advanced] {
                let r = readability(text, complexity);
                assert!((1..=10).contains(&r), "readability {r} for {text:.20}");
                let ls = language_simplicity(text, complexity);
                assert!((0.3..=1.0).contains(&ls));
            }
            assert!((0.3..=1.0).contains(&coherence(text)));
            assert!((0.4..=1.0).contains(&engagement(text)));
            assert!((0.3..=1.0).contains(&creativity(text)));
            assert!((0.4..=1.0).contains(&theme_consistency(text)));
            assert!((0.5..=1.0).contains(&educational_value(text, &[])));
            assert!((0.6..=1.0).contains(&accuracy(text, "some source words here")));
        }
    }

    #[test]
    fn connectives_raise_coherence() {
        let connected = "First the cat woke up. Then she stretched. Next she ate. \
            Finally she napped because the sun was warm. Meanwhile the dog waited. \
            However nothing happened.";
        let flat = "The cat woke up. She stretched. She ate. She napped. \
            The dog waited. Nothing happened.";
        assert!(coherence(connected) > coherence(flat));
    }

    #[test]
    fn accuracy_rewards_source_overlap() {
        let source = "Photosynthesis converts sunlight carbon dioxide and water \
            into glucose and oxygen inside the chloroplast";
        let faithful = "The cat learned that photosynthesis converts sunlight \
            carbon dioxide and water into glucose and oxygen in the chloroplast";
        let unrelated = "A pirate sailed the seven seas looking for treasure";
        assert!(accuracy(faithful, source) > accuracy(unrelated, source));
        assert_eq!(accuracy(unrelated, source), 0.6);
    }

    #[test]
    fn educational_value_counts_mentioned_concepts() {
        let story = "Whiskers learned that gravity pulls things down. Her teacher \
            explained an example so she could understand. It is important to \
            remember this knowledge because practice helps you learn.";
        let concepts = vec!["gravity".to_string(), "momentum".to_string()];
        let with_concepts = educational_value(story, &concepts);
        let without = educational_value(story, &[]);
        assert!(with_concepts > without);
    }

    #[test]
    fn simplicity_peaks_at_expected_length() {
        // SIMPLE_STORY averages ~5-6 words per sentence.
        let basic = language_simplicity(SIMPLE_STORY, Complexity::Basic);
        let advanced = language_simplicity(SIMPLE_STORY, Complexity::Advanced);
        assert!(basic > advanced);
    }

    #[test]
    fn metrics_bundle_carries_word_count_and_reading_time() {
        let metrics = quality_metrics(SIMPLE_STORY, "a source text", &[], Complexity::Basic);
        assert_eq!(metrics.word_count, SIMPLE_STORY.split_whitespace().count());
        assert_eq!(metrics.reading_minutes, 1);
    }
}
