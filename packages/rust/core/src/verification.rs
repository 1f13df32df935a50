//! Content preservation check between an original and a formatted text.
//!
//! Both texts are reduced to bare prose with [`strip_markup`]. Loss is
//! measured at two granularities: total word count, and per-sentence
//! presence (exact normalized substring first, then a token-overlap
//! fallback so that rewrapped lines are not reported as missing).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use mystify_markdown::{count_words, strip_markup};
use mystify_shared::VerificationConfig;

/// Word-count drops above this are reported.
const MINOR_DROP_WORDS: usize = 5;
/// Word-count drops at or above this are errors.
const MAJOR_DROP_WORDS: usize = 50;
/// Word-count gains above this are reported as informational.
const ADDED_WORDS_NOTICE: usize = 5;
/// Significant words are longer than this.
const SIGNIFICANT_WORD_LEN: usize = 3;
const EXCERPT_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissingSentence,
    MissingSentencesOverflow,
    WordCountDrop,
    ContentAdded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub is_preserved: bool,
    pub original_word_count: usize,
    pub formatted_word_count: usize,
    /// `min(100, formatted / original * 100)`.
    pub preservation_percentage: f64,
    pub original_sentence_count: usize,
    pub missing_sentence_count: usize,
    pub sentence_preservation_rate: f64,
    pub issues: Vec<VerificationIssue>,
}

impl VerificationResult {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify with default thresholds.
pub fn verify_preservation(original: &str, formatted: &str) -> VerificationResult {
    verify_preservation_with(original, formatted, &VerificationConfig::default())
}

/// Verify that `formatted` lost no content from `original`.
#[instrument(skip_all, fields(original_len = original.len(), formatted_len = formatted.len()))]
pub fn verify_preservation_with(
    original: &str,
    formatted: &str,
    config: &VerificationConfig,
) -> VerificationResult {
    let original_word_count = count_words(original);
    let formatted_word_count = count_words(formatted);
    let preservation_percentage = if original_word_count == 0 {
        100.0
    } else {
        (formatted_word_count as f64 / original_word_count as f64 * 100.0).min(100.0)
    };

    let stripped_original = strip_markup(original);
    let stripped_formatted = strip_markup(formatted);
    let sentences = split_sentences(&stripped_original);
    let haystack = format!(" {} ", normalize(&stripped_formatted));
    let formatted_tokens: HashSet<&str> = haystack.split_whitespace().collect();

    let missing: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| {
            !sentence_present(s, &haystack, &formatted_tokens, config.token_overlap_threshold)
        })
        .collect();

    let original_sentence_count = sentences.len();
    let sentence_preservation_rate = if original_sentence_count == 0 {
        100.0
    } else {
        (original_sentence_count - missing.len()) as f64 / original_sentence_count as f64 * 100.0
    };

    let mut issues = Vec::new();
    for sentence in missing.iter().take(config.max_reported_missing) {
        issues.push(VerificationIssue {
            issue_type: IssueType::MissingSentence,
            severity: Severity::Error,
            description: "sentence not found in formatted text".to_string(),
            excerpt: Some(excerpt(sentence)),
        });
    }
    if missing.len() > config.max_reported_missing {
        let overflow = missing.len() - config.max_reported_missing;
        issues.push(VerificationIssue {
            issue_type: IssueType::MissingSentencesOverflow,
            severity: Severity::Error,
            description: format!("{overflow} more missing sentences not listed"),
            excerpt: None,
        });
    }

    if formatted_word_count < original_word_count {
        let dropped = original_word_count - formatted_word_count;
        if dropped > MINOR_DROP_WORDS {
            let severity = if dropped >= MAJOR_DROP_WORDS {
                Severity::Error
            } else {
                Severity::Warning
            };
            issues.push(VerificationIssue {
                issue_type: IssueType::WordCountDrop,
                severity,
                description: format!(
                    "word count dropped by {dropped} ({original_word_count} -> {formatted_word_count})"
                ),
                excerpt: None,
            });
        }
    } else if formatted_word_count - original_word_count > ADDED_WORDS_NOTICE {
        issues.push(VerificationIssue {
            issue_type: IssueType::ContentAdded,
            severity: Severity::Info,
            description: format!(
                "formatted text gained {} words",
                formatted_word_count - original_word_count
            ),
            excerpt: None,
        });
    }

    let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
    let is_preserved = preservation_percentage >= config.min_word_preservation
        && sentence_preservation_rate >= config.min_sentence_preservation
        && !has_errors;

    if is_preserved {
        debug!(
            preservation_percentage,
            sentence_preservation_rate, "content preserved"
        );
    } else {
        warn!(
            preservation_percentage,
            sentence_preservation_rate,
            missing = missing.len(),
            "content preservation check failed"
        );
    }

    VerificationResult {
        is_preserved,
        original_word_count,
        formatted_word_count,
        preservation_percentage,
        original_sentence_count,
        missing_sentence_count: missing.len(),
        sentence_preservation_rate,
        issues,
    }
}

// ---------------------------------------------------------------------------
// Sentence helpers
// ---------------------------------------------------------------------------

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(\s+|$)").expect("valid regex"));

/// Split stripped prose into sentences. Line breaks are treated as spaces,
/// so headings and list items join the following sentence.
fn split_sentences(stripped: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(stripped) {
        push_sentence(&mut sentences, &stripped[start..m.end()]);
        start = m.end();
    }
    push_sentence(&mut sentences, &stripped[start..]);
    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, candidate: &'a str) {
    let trimmed = candidate.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed);
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_lowercase().next().unwrap_or(c))
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sentence_present(
    sentence: &str,
    haystack: &str,
    formatted_tokens: &HashSet<&str>,
    overlap_threshold: f64,
) -> bool {
    let normalized = normalize(sentence);
    if normalized.is_empty() || haystack.contains(&format!(" {normalized} ")) {
        return true;
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();
    let significant: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| w.chars().count() > SIGNIFICANT_WORD_LEN)
        .collect();
    let checked = if significant.is_empty() { &words } else { &significant };

    let present = checked.iter().filter(|w| formatted_tokens.contains(*w)).count();
    present as f64 / checked.len() as f64 >= overlap_threshold
}

fn excerpt(sentence: &str) -> String {
    if sentence.chars().count() <= EXCERPT_CHARS {
        sentence.to_string()
    } else {
        let cut: String = sentence.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
