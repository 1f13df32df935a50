//! Weighted keyword classifier for admonition-worthy paragraphs.
//!
//! Each admonition type owns a [`RuleTable`] of `(label, pattern, weight)`
//! rules. A type's score for a paragraph is the *maximum* weight among its
//! matching rules; the best-scoring type wins, with ties resolved by
//! [`AdmonitionType::PRIORITY`].

use std::collections::BTreeSet;
use std::sync::LazyLock;

use tracing::{debug, instrument};

use mystify_shared::{AdmonitionSuggestion, AdmonitionType, ContentBlock};

use crate::rules::RuleTable;

/// Paragraphs shorter than this are never suggested.
pub const MIN_ADMONITION_WORDS: usize = 5;

type RuleSpec = &'static [(&'static str, &'static str, f64)];

const DANGER_RULES: RuleSpec = &[
    ("'Danger:' label", r"(?i)^\s*(\*\*|__)?danger(\*\*|__)?\s*[:!\-]", 0.9),
    ("danger vocabulary", r"(?i)\b(danger|dangerous|fatal|catastrophic|hazard)\b", 0.8),
    ("irreversible action", r"(?i)\b(irreversible|permanently|cannot be undone|data loss)\b", 0.75),
    ("'never'", r"(?i)\bnever\b", 0.55),
    ("destructive verb", r"(?i)\b(delete|destroy|wipe|erase)\b", 0.5),
];

const ERROR_RULES: RuleSpec = &[
    ("'Error:' label", r"(?i)^\s*(\*\*|__)?error(\*\*|__)?\s*[:!\-]", 0.9),
    ("failure phrasing", r"(?i)\b(will fail|throws? an?|returns an error|raises an?)\b", 0.7),
    ("error vocabulary", r"(?i)\b(errors?|exceptions?|fails?|failure|crash(es)?)\b", 0.6),
];

const WARNING_RULES: RuleSpec = &[
    ("'Warning:' label", r"(?i)^\s*(\*\*|__)?warning(\*\*|__)?\s*[:!\-]", 0.9),
    ("warning vocabulary", r"(?i)\b(warning|beware)\b", 0.75),
    ("'be careful'", r"(?i)\bbe careful\b", 0.7),
    ("deprecation", r"(?i)\bdeprecated\b", 0.7),
    ("prohibition", r"(?i)\b(do not|don't|avoid)\b", 0.6),
];

const CAUTION_RULES: RuleSpec = &[
    ("'Caution:' label", r"(?i)^\s*(\*\*|__)?caution(\*\*|__)?\s*[:!\-]", 0.9),
    ("caution vocabulary", r"(?i)\b(caution|cautious|cautiously|carefully)\b", 0.7),
    ("possible side effects", r"(?i)\b(may cause|might break|side effects?)\b", 0.6),
];

const IMPORTANT_RULES: RuleSpec = &[
    ("'Important:' label", r"(?i)^\s*(\*\*|__)?important(\*\*|__)?\s*[:!\-]", 0.9),
    ("importance vocabulary", r"(?i)\b(important|importantly|crucial|essential|critical)\b", 0.7),
    ("requirement", r"(?i)\b(must|required|make sure|ensure)\b", 0.55),
];

const ATTENTION_RULES: RuleSpec = &[
    ("'Attention:' label", r"(?i)^\s*(\*\*|__)?attention(\*\*|__)?\s*[:!\-]", 0.9),
    ("attention vocabulary", r"(?i)\b(attention|pay attention|take note)\b", 0.7),
    ("'notice'", r"(?i)\bnotice\b", 0.5),
];

const TIP_RULES: RuleSpec = &[
    ("'Tip:' label", r"(?i)^\s*(\*\*|__)?(pro\s*)?tip(\*\*|__)?\s*[:!\-]", 0.9),
    ("tip vocabulary", r"(?i)\b(tip|pro tip|protip)\b", 0.75),
    ("recommendation", r"(?i)\b(you can|try|consider|recommended?|best practice)\b", 0.55),
    ("shortcut", r"(?i)\b(shortcut|quickly|easily)\b", 0.5),
];

const HINT_RULES: RuleSpec = &[
    ("'Hint:' label", r"(?i)^\s*(\*\*|__)?hint(\*\*|__)?\s*[:!\-]", 0.9),
    ("hint vocabulary", r"(?i)\bhints?\b", 0.75),
    ("reminder", r"(?i)\b(clue|as a reminder|remember that)\b", 0.6),
];

const NOTE_RULES: RuleSpec = &[
    ("'Note:' label", r"(?i)^\s*(\*\*|__)?(note|nb|n\.b\.)(\*\*|__)?\s*[:!\-]", 0.9),
    ("'note that'", r"(?i)\b(please note|note that|keep in mind)\b", 0.75),
    ("note vocabulary", r"(?i)\b(note|noted)\b", 0.7),
    ("aside", r"(?i)\b(in addition|additionally|by the way)\b", 0.5),
];

const SEEALSO_RULES: RuleSpec = &[
    ("'See also:' label", r"(?i)^\s*(\*\*|__)?see\s*also(\*\*|__)?\s*[:!\-]", 0.9),
    ("cross reference", r"(?i)\b(see also|refer to|for more information|learn more)\b", 0.75),
    ("related material", r"(?i)\b(related|documentation for)\b", 0.5),
];

fn rule_spec(kind: AdmonitionType) -> RuleSpec {
    match kind {
        AdmonitionType::Danger => DANGER_RULES,
        AdmonitionType::Error => ERROR_RULES,
        AdmonitionType::Warning => WARNING_RULES,
        AdmonitionType::Caution => CAUTION_RULES,
        AdmonitionType::Important => IMPORTANT_RULES,
        AdmonitionType::Attention => ATTENTION_RULES,
        AdmonitionType::Tip => TIP_RULES,
        AdmonitionType::Hint => HINT_RULES,
        AdmonitionType::Note => NOTE_RULES,
        AdmonitionType::SeeAlso => SEEALSO_RULES,
    }
}

/// Compiled tables in priority order.
static ADMONITION_RULES: LazyLock<Vec<(AdmonitionType, RuleTable)>> = LazyLock::new(|| {
    AdmonitionType::PRIORITY
        .into_iter()
        .map(|kind| (kind, RuleTable::compile(rule_spec(kind))))
        .collect()
});

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Knobs for [`detect_admonition_candidates`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOptions {
    pub min_confidence: f64,
    pub max_suggestions: usize,
    pub enabled_types: BTreeSet<AdmonitionType>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.65,
            max_suggestions: 50,
            enabled_types: AdmonitionType::PRIORITY.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Winning type for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub admonition_type: AdmonitionType,
    pub score: f64,
    /// Label of the rule that produced the score.
    pub label: &'static str,
}

/// Classify `text` against the enabled types. Pure: the same text, types
/// and tables always give the same answer.
pub fn classify_text(text: &str, enabled: &BTreeSet<AdmonitionType>) -> Option<Classification> {
    let mut best: Option<Classification> = None;

    for (kind, table) in ADMONITION_RULES.iter() {
        if !enabled.contains(kind) {
            continue;
        }
        let Some(rule) = table.strongest(text) else {
            continue;
        };
        let wins = best.as_ref().is_none_or(|b| {
            rule.weight > b.score
                || (rule.weight == b.score && kind.rank() < b.admonition_type.rank())
        });
        if wins {
            best = Some(Classification {
                admonition_type: *kind,
                score: rule.weight,
                label: rule.label,
            });
        }
    }

    best
}

/// A paragraph that already opens an admonition or directive fence.
fn is_already_wrapped(block: &ContentBlock) -> bool {
    let text = block.content.trim_start();
    text.starts_with(":::") || text.starts_with("```{")
}

/// Suggest admonitions for eligible paragraph blocks.
///
/// Results are sorted by confidence (highest first, document order among
/// equals) and truncated to `max_suggestions`.
#[instrument(skip_all, fields(blocks = blocks.len(), min_confidence = opts.min_confidence))]
pub fn detect_admonition_candidates(
    blocks: &[ContentBlock],
    opts: &DetectionOptions,
) -> Vec<AdmonitionSuggestion> {
    let mut suggestions: Vec<AdmonitionSuggestion> = blocks
        .iter()
        .filter(|b| b.is_paragraph() && !is_already_wrapped(b))
        .filter(|b| b.word_count() >= MIN_ADMONITION_WORDS)
        .filter_map(|b| {
            let found = classify_text(&b.content, &opts.enabled_types)?;
            (found.score >= opts.min_confidence).then(|| AdmonitionSuggestion {
                block_id: b.id,
                admonition_type: found.admonition_type,
                confidence: found.score,
                reason: format!("matched {}", found.label),
                suggested_title: None,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    suggestions.truncate(opts.max_suggestions);

    debug!(suggestions = suggestions.len(), "admonition detection complete");
    suggestions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn enabled(types: &[AdmonitionType]) -> BTreeSet<AdmonitionType> {
        types.iter().copied().collect()
    }

    fn opts(types: &[AdmonitionType], min_confidence: f64) -> DetectionOptions {
        DetectionOptions {
            min_confidence,
            max_suggestions: 50,
            enabled_types: enabled(types),
        }
    }

    #[test]
    fn every_table_compiles_in_priority_order() {
        let kinds: Vec<_> = ADMONITION_RULES.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, AdmonitionType::PRIORITY.to_vec());
        assert!(ADMONITION_RULES.iter().all(|(_, t)| !t.is_empty()));
    }

    #[test]
    fn warning_label_beats_danger_keywords() {
        let parsed = parse("Warning: never delete the root directory.");
        let found = detect_admonition_candidates(
            &parsed.blocks,
            &opts(&[AdmonitionType::Danger, AdmonitionType::Warning], 0.5),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].admonition_type, AdmonitionType::Warning);
        assert_eq!(found[0].confidence, 0.9);
        assert_eq!(found[0].block_id, parsed.blocks[0].id);
    }

    #[test]
    fn max_not_sum() {
        // Danger has two weak matches (never, delete); warning one strong one.
        let c = classify_text(
            "Beware: never delete anything here",
            &enabled(&[AdmonitionType::Danger, AdmonitionType::Warning]),
        )
        .expect("classified");
        assert_eq!(c.admonition_type, AdmonitionType::Warning);
        assert_eq!(c.score, 0.75);
    }

    #[test]
    fn ties_go_to_higher_priority() {
        // Both score 0.75 from vocabulary alone.
        let c = classify_text(
            "A pro tip worth repeating: note that caching helps",
            &enabled(&[AdmonitionType::Tip, AdmonitionType::Note]),
        )
        .expect("classified");
        assert_eq!(c.admonition_type, AdmonitionType::Tip);
        assert_eq!(c.score, 0.75);
    }

    #[test]
    fn short_paragraphs_are_skipped() {
        let all = opts(&AdmonitionType::PRIORITY, 0.0);
        let parsed = parse("Warning: danger here!");
        assert!(detect_admonition_candidates(&parsed.blocks, &all).is_empty());

        let parsed = parse("Hi there friend");
        assert!(detect_admonition_candidates(&parsed.blocks, &all).is_empty());
    }

    #[test]
    fn disabled_types_are_not_considered() {
        let c = classify_text(
            "Warning: never delete the root directory.",
            &enabled(&[AdmonitionType::Danger]),
        )
        .expect("classified");
        assert_eq!(c.admonition_type, AdmonitionType::Danger);
        assert!(classify_text("Warning: be careful", &BTreeSet::new()).is_none());
    }

    #[test]
    fn threshold_filters_weak_matches() {
        let parsed = parse("You can also run the tool in watch mode.");
        let all = &AdmonitionType::PRIORITY;
        assert_eq!(detect_admonition_candidates(&parsed.blocks, &opts(all, 0.5)).len(), 1);
        assert!(detect_admonition_candidates(&parsed.blocks, &opts(all, 0.65)).is_empty());
    }

    #[test]
    fn only_unwrapped_paragraphs_qualify() {
        let raw = ":::{note}\nNote: this one is already inside a note.\n:::\n\n# Warning: headings are not paragraphs either\n\n> Warning: quotes are left alone as well\n";
        let parsed = parse(raw);
        let defaults = DetectionOptions::default();
        assert!(detect_admonition_candidates(&parsed.blocks, &defaults).is_empty());
    }

    #[test]
    fn sorted_by_confidence_and_truncated() {
        let raw = "You can also run the tool in watch mode.\n\nDanger: this wipes the whole production database.\n\nNote that the cache lives in your home directory.\n";
        let parsed = parse(raw);
        let mut options = opts(&AdmonitionType::PRIORITY, 0.5);
        let found = detect_admonition_candidates(&parsed.blocks, &options);
        let kinds: Vec<_> = found.iter().map(|s| s.admonition_type).collect();
        assert_eq!(
            kinds,
            vec![AdmonitionType::Danger, AdmonitionType::Note, AdmonitionType::Tip]
        );

        options.max_suggestions = 1;
        let found = detect_admonition_candidates(&parsed.blocks, &options);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].admonition_type, AdmonitionType::Danger);
    }

    #[test]
    fn classification_is_deterministic() {
        let types = enabled(&AdmonitionType::PRIORITY);
        let text = "Important: make sure you back up the config before upgrading.";
        let first = classify_text(text, &types);
        for _ in 0..5 {
            assert_eq!(classify_text(text, &types), first);
        }
    }
}
