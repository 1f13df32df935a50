//! Parsing and heuristic analysis of semi-structured Markdown/MyST text.
//!
//! [`parse`] splits raw text into typed blocks without losing a byte;
//! [`detect_patterns`] and [`detect_admonition_candidates`] annotate those
//! blocks; [`normalize_spacing`] and [`strip_markup`] are the text passes
//! used by the engine and by verification.

mod admonitions;
mod cleanup;
mod languages;
mod parser;
mod patterns;
mod rules;
mod strip;

pub use admonitions::{
    Classification, DetectionOptions, MIN_ADMONITION_WORDS, classify_text,
    detect_admonition_candidates,
};
pub use cleanup::normalize_spacing;
pub use languages::{LanguageGuess, MIN_LANGUAGE_SCORE, detect_language};
pub use parser::{fenced_body, parse, parse_with_ids};
pub use patterns::{
    BareUrl, CodeDetection, MIN_CODE_INDICATORS, detect_bare_urls, detect_patterns,
    detect_unformatted_code,
};
pub use rules::{RuleTable, WeightedRule};
pub use strip::{count_words, strip_markup};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
