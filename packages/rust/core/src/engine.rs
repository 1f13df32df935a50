//! The transformation engine: raw text in, annotated MyST text out.
//!
//! The engine never fails. Malformed structure is tolerated by the parser,
//! every block is transformed independently, and the only reported problems
//! are soft warnings. Hard failure detection belongs to
//! [`crate::verification`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use mystify_markdown::{
    DetectionOptions, count_words, detect_admonition_candidates, detect_patterns,
    normalize_spacing, parse,
};
use mystify_shared::{
    AdmonitionSuggestion, AdmonitionType, BlockId, BlockType, ContentBlock, DetectedPattern,
    ParsedContent, PatternType, SuggestionSource, TransformationConfig,
};

use crate::features::CapabilitySet;
use crate::suggestions::{ResolvedSuggestion, merge_suggestions, resolve_external};

/// Below-threshold admonition candidates at or above this confidence are
/// still reported as hints.
pub const HINT_CONFIDENCE_FLOOR: f64 = 0.3;

/// A formatted word count below this fraction of the original triggers a warning.
const WORD_COUNT_WARNING_RATIO: f64 = 0.95;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// What was done to a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformationKind {
    /// Paragraph wrapped in `:::{type}`.
    Admonition {
        #[serde(rename = "type")]
        admonition_type: AdmonitionType,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        source: SuggestionSource,
    },
    /// Language injected into an untagged code fence.
    LanguageTag { language: String },
    /// Prose paragraph fenced as code.
    CodeFence {
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

/// One applied transformation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedTransformation {
    pub block_id: BlockId,
    #[serde(flatten)]
    pub kind: TransformationKind,
    pub confidence: f64,
    pub description: String,
}

/// A detection that was not applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TransformationHint {
    Pattern(DetectedPattern),
    Admonition(AdmonitionSuggestion),
}

impl TransformationHint {
    pub fn block_id(&self) -> BlockId {
        match self {
            Self::Pattern(p) => p.block_id,
            Self::Admonition(a) => a.block_id,
        }
    }
}

/// Output of [`transform_content`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationResult {
    pub formatted_content: String,
    pub original_word_count: usize,
    pub formatted_word_count: usize,
    pub applied_transformations: Vec<AppliedTransformation>,
    /// Unapplied hints, in block order.
    pub suggestions: Vec<TransformationHint>,
    pub warnings: Vec<String>,
    /// The input ended inside a fence, directive, or math region.
    pub truncated_at_eof: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Transform raw text according to `config`.
#[instrument(skip_all, fields(len = raw.len(), features = config.selected_features.len()))]
pub fn transform_content(raw: &str, config: &TransformationConfig) -> TransformationResult {
    let (capabilities, mut warnings) = CapabilitySet::resolve(config);

    let parsed = parse(raw);
    if parsed.truncated_at_eof {
        warn!("input ends inside an unterminated fence, directive, or math region");
    }
    let patterns = detect_patterns(&parsed);

    let (fallback, mut admonition_hints) = rule_based_suggestions(&parsed, config, &capabilities);
    let external = resolve_external(&config.external_suggestions, &parsed);
    debug!(
        rule_based = fallback.len(),
        external = external.len(),
        "suggestion sets ready"
    );

    let merged = merge_suggestions(
        external
            .into_iter()
            .chain(fallback.iter().map(ResolvedSuggestion::from)),
    );

    let mut applied = Vec::new();
    let mut output = String::with_capacity(raw.len() + raw.len() / 8);

    for block in &parsed.blocks {
        let transformed = transform_block(
            block,
            &patterns,
            &merged,
            &capabilities,
            config,
            &mut applied,
            &mut warnings,
        );
        output.push_str(transformed.as_deref().unwrap_or(&block.content));
        output.push_str(block.terminator());
    }

    let formatted_content = normalize_spacing(&output);
    let original_word_count = parsed.word_count;
    let formatted_word_count = count_words(&formatted_content);

    if original_word_count > 0
        && (formatted_word_count as f64) < original_word_count as f64 * WORD_COUNT_WARNING_RATIO
    {
        let message = format!(
            "formatted text has {formatted_word_count} words, fewer than 95% of the original {original_word_count}"
        );
        warn!("{message}");
        warnings.push(message);
    }

    // Rule-based suggestions that lost to truncation or to another winner.
    let applied_blocks: BTreeSet<BlockId> = applied.iter().map(|a| a.block_id).collect();
    admonition_hints.extend(
        fallback
            .into_iter()
            .filter(|s| !applied_blocks.contains(&s.block_id)),
    );
    let suggestions = collect_hints(patterns, admonition_hints, &applied);

    debug!(
        applied = applied.len(),
        hints = suggestions.len(),
        warnings = warnings.len(),
        "transformation complete"
    );

    TransformationResult {
        formatted_content,
        original_word_count,
        formatted_word_count,
        applied_transformations: applied,
        suggestions,
        warnings,
        truncated_at_eof: parsed.truncated_at_eof,
    }
}

/// Run admonition detection once and split the candidates into the
/// applicable fallback set and below-threshold (or overflow) hints.
fn rule_based_suggestions(
    parsed: &ParsedContent,
    config: &TransformationConfig,
    capabilities: &CapabilitySet,
) -> (Vec<AdmonitionSuggestion>, Vec<AdmonitionSuggestion>) {
    if capabilities.admonitions.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let threshold = config.admonition_confidence_threshold;
    let opts = DetectionOptions {
        min_confidence: HINT_CONFIDENCE_FLOOR.min(threshold),
        max_suggestions: usize::MAX,
        enabled_types: capabilities.admonitions.clone(),
    };
    let candidates = detect_admonition_candidates(&parsed.blocks, &opts);

    let (mut fallback, mut hints): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|s| s.confidence >= threshold);
    if fallback.len() > config.max_admonitions {
        hints.extend(fallback.split_off(config.max_admonitions));
    }
    (fallback, hints)
}

fn transform_block(
    block: &ContentBlock,
    patterns: &[DetectedPattern],
    merged: &BTreeMap<BlockId, ResolvedSuggestion>,
    capabilities: &CapabilitySet,
    config: &TransformationConfig,
    applied: &mut Vec<AppliedTransformation>,
    warnings: &mut Vec<String>,
) -> Option<String> {
    match block.block_type {
        BlockType::Code if capabilities.language_detection => {
            let pattern = code_pattern(patterns, block.id)?;
            let language = pattern.metadata.get("language")?;
            let text = inject_language(block, language)?;
            applied.push(AppliedTransformation {
                block_id: block.id,
                kind: TransformationKind::LanguageTag {
                    language: language.clone(),
                },
                confidence: pattern.confidence,
                description: format!("tagged code block as {language}"),
            });
            Some(text)
        }
        BlockType::Paragraph => {
            if let Some(suggestion) = merged.get(&block.id) {
                if capabilities.allows(suggestion.admonition_type) {
                    applied.push(AppliedTransformation {
                        block_id: block.id,
                        kind: TransformationKind::Admonition {
                            admonition_type: suggestion.admonition_type,
                            title: suggestion.title.clone(),
                            source: suggestion.source,
                        },
                        confidence: suggestion.confidence,
                        description: format!(
                            "wrapped paragraph in {} admonition",
                            suggestion.admonition_type
                        ),
                    });
                    return Some(wrap_admonition(
                        block,
                        suggestion.admonition_type,
                        suggestion.title.as_deref(),
                    ));
                }
                warnings.push(format!(
                    "suggested {} admonition for {} skipped: type not enabled",
                    suggestion.admonition_type, block.id
                ));
            }

            if !capabilities.code_blocks {
                return None;
            }
            let pattern = code_pattern(patterns, block.id)?;
            if pattern.confidence < config.code_wrap_threshold {
                return None;
            }
            let language = pattern.metadata.get("language").cloned();
            applied.push(AppliedTransformation {
                block_id: block.id,
                kind: TransformationKind::CodeFence {
                    language: language.clone(),
                },
                confidence: pattern.confidence,
                description: "fenced unformatted code".to_string(),
            });
            Some(wrap_code(block, language.as_deref()))
        }
        _ => None,
    }
}

fn code_pattern(patterns: &[DetectedPattern], id: BlockId) -> Option<&DetectedPattern> {
    patterns
        .iter()
        .find(|p| p.block_id == id && p.pattern_type == PatternType::Code)
}

/// Hints are every detected pattern not consumed by a transformation, plus
/// the unapplied admonition candidates, ordered by block.
fn collect_hints(
    patterns: Vec<DetectedPattern>,
    admonitions: Vec<AdmonitionSuggestion>,
    applied: &[AppliedTransformation],
) -> Vec<TransformationHint> {
    let consumed: BTreeSet<BlockId> = applied
        .iter()
        .filter(|a| !matches!(a.kind, TransformationKind::Admonition { .. }))
        .map(|a| a.block_id)
        .collect();

    let mut hints: Vec<TransformationHint> = patterns
        .into_iter()
        .filter(|p| !(p.pattern_type == PatternType::Code && consumed.contains(&p.block_id)))
        .map(TransformationHint::Pattern)
        .chain(admonitions.into_iter().map(TransformationHint::Admonition))
        .collect();
    hints.sort_by_key(TransformationHint::block_id);
    hints
}

// ---------------------------------------------------------------------------
// Block rewriting
// ---------------------------------------------------------------------------

fn line_ending(block: &ContentBlock) -> &'static str {
    if block.raw_content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Longest run of `c` starting any line of `text`.
fn longest_leading_run(text: &str, c: char) -> usize {
    text.lines()
        .map(|l| l.trim_start().chars().take_while(|&ch| ch == c).count())
        .max()
        .unwrap_or(0)
}

/// Longest run of `c` anywhere in `text`.
fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// `:::{type} [title]` … `:::`, with a colon fence longer than any run inside.
fn wrap_admonition(block: &ContentBlock, kind: AdmonitionType, title: Option<&str>) -> String {
    let eol = line_ending(block);
    let fence = ":".repeat(3.max(longest_leading_run(&block.content, ':') + 1));
    let header = match title {
        Some(title) => format!("{fence}{{{kind}}} {title}"),
        None => format!("{fence}{{{kind}}}"),
    };
    format!("{header}{eol}{}{eol}{fence}", block.content)
}

/// Fence a paragraph as code, with a backtick fence longer than any run inside.
fn wrap_code(block: &ContentBlock, language: Option<&str>) -> String {
    let eol = line_ending(block);
    let fence = "`".repeat(3.max(longest_run(&block.content, '`') + 1));
    format!(
        "{fence}{}{eol}{}{eol}{fence}",
        language.unwrap_or_default(),
        block.content
    )
}

/// Rewrite the opening fence line of an untagged code block to carry `language`.
fn inject_language(block: &ContentBlock, language: &str) -> Option<String> {
    let (opener, rest) = match block.content.split_once('\n') {
        Some((opener, rest)) => (opener, Some(rest)),
        None => (block.content.as_str(), None),
    };
    let (opener, cr) = match opener.strip_suffix('\r') {
        Some(stripped) => (stripped, "\r"),
        None => (opener, ""),
    };

    let indent_len = opener.len() - opener.trim_start().len();
    let (indent, fence_part) = opener.split_at(indent_len);
    let fence_char = fence_part.chars().next()?;
    let run_len = fence_part.chars().take_while(|&c| c == fence_char).count();
    let (run, info) = fence_part.split_at(run_len * fence_char.len_utf8());
    if !info.trim().is_empty() {
        return None;
    }

    let mut text = format!("{indent}{run}{language}{cr}");
    if let Some(rest) = rest {
        text.push('\n');
        text.push_str(rest);
    }
    Some(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mystify_shared::ExternalSuggestion;

    fn config(features: &[&str], threshold: f64) -> TransformationConfig {
        TransformationConfig {
            admonition_confidence_threshold: threshold,
            ..TransformationConfig::with_features(features.iter().copied())
        }
    }

    #[test]
    fn warning_paragraph_is_wrapped() {
        let result = transform_content(
            "Warning: never delete the root directory.",
            &config(&["danger", "warning"], 0.5),
        );
        assert_eq!(
            result.formatted_content,
            ":::{warning}\nWarning: never delete the root directory.\n:::"
        );
        assert_eq!(result.applied_transformations.len(), 1);
        assert!(matches!(
            result.applied_transformations[0].kind,
            TransformationKind::Admonition {
                admonition_type: AdmonitionType::Warning,
                source: SuggestionSource::RuleBased,
                ..
            }
        ));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn untagged_fence_gets_language() {
        let result = transform_content(
            "```\ndef f(x):\n    return x\n```",
            &config(&["code-block"], 0.65),
        );
        assert_eq!(result.formatted_content, "```python\ndef f(x):\n    return x\n```");
        assert!(matches!(
            &result.applied_transformations[0].kind,
            TransformationKind::LanguageTag { language } if language == "python"
        ));
    }

    #[test]
    fn language_injection_respects_toggle() {
        let mut cfg = config(&["code-block"], 0.65);
        cfg.auto_detect_language = false;
        let raw = "```\ndef f(x):\n    return x\n```";
        let result = transform_content(raw, &cfg);
        assert_eq!(result.formatted_content, raw);
        assert!(result.applied_transformations.is_empty());
        // The unused detection is still reported.
        assert!(matches!(
            result.suggestions.as_slice(),
            [TransformationHint::Pattern(p)] if p.pattern_type == PatternType::Code
        ));
    }

    #[test]
    fn unfenced_code_is_wrapped() {
        let raw = "Intro text here.\n\nfunction add(a, b) {\n    return a + b;\n}\n";
        let result = transform_content(raw, &config(&["code-blocks"], 0.65));
        assert_eq!(
            result.formatted_content,
            "Intro text here.\n\n```javascript\nfunction add(a, b) {\n    return a + b;\n}\n```\n"
        );
    }

    #[test]
    fn short_paragraph_never_wrapped() {
        let result = transform_content("Hi there friend", &config(&["all"], 0.0));
        assert_eq!(result.formatted_content, "Hi there friend");
        assert!(result.applied_transformations.is_empty());
    }

    #[test]
    fn external_suggestion_overrides_rule_based() {
        let mut cfg = config(&["admonitions"], 0.5);
        cfg.external_suggestions = vec![ExternalSuggestion {
            paragraph_id: "block-0".into(),
            admonition_type: "tip".into(),
            title: Some("Heads up".into()),
            reason: "model".into(),
            confidence: 0.1,
        }];
        let result = transform_content("Warning: never delete the root directory.", &cfg);
        assert_eq!(
            result.formatted_content,
            ":::{tip} Heads up\nWarning: never delete the root directory.\n:::"
        );
        assert!(matches!(
            result.applied_transformations[0].kind,
            TransformationKind::Admonition {
                admonition_type: AdmonitionType::Tip,
                source: SuggestionSource::External,
                ..
            }
        ));
    }

    #[test]
    fn external_suggestion_with_stale_id_is_ignored() {
        let mut cfg = config(&["admonitions"], 0.5);
        cfg.external_suggestions = vec![ExternalSuggestion {
            paragraph_id: "block-42".into(),
            admonition_type: "tip".into(),
            title: None,
            reason: String::new(),
            confidence: 1.0,
        }];
        let result = transform_content("Warning: never delete the root directory.", &cfg);
        assert!(result.formatted_content.starts_with(":::{warning}"));
    }

    #[test]
    fn disabled_external_type_is_skipped_with_warning() {
        let mut cfg = config(&["warning"], 0.5);
        cfg.external_suggestions = vec![ExternalSuggestion {
            paragraph_id: "block-0".into(),
            admonition_type: "note".into(),
            title: None,
            reason: String::new(),
            confidence: 1.0,
        }];
        let raw = "Warning: never delete the root directory.";
        let result = transform_content(raw, &cfg);
        assert_eq!(result.formatted_content, raw);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("note"));
    }

    #[test]
    fn below_threshold_candidates_become_hints() {
        let raw = "You can also run the tool in watch mode.";
        let result = transform_content(raw, &config(&["admonitions"], 0.65));
        assert_eq!(result.formatted_content, raw);
        assert!(matches!(
            result.suggestions.as_slice(),
            [TransformationHint::Admonition(s)] if s.admonition_type == AdmonitionType::Tip
        ));
    }

    #[test]
    fn max_admonitions_caps_rule_based_wraps() {
        let raw = "Warning: never delete the root directory.\n\nDanger: this wipes the whole production database.\n";
        let mut cfg = config(&["admonitions"], 0.5);
        cfg.max_admonitions = 1;
        let result = transform_content(raw, &cfg);
        assert_eq!(result.applied_transformations.len(), 1);
        assert!(
            result
                .suggestions
                .iter()
                .any(|h| matches!(h, TransformationHint::Admonition(_)))
        );
    }

    #[test]
    fn colon_fence_outgrows_inner_runs() {
        let block = ContentBlock {
            id: BlockId(0),
            block_type: BlockType::Paragraph,
            content: "::: looks like a fence\nbut is prose".into(),
            raw_content: "::: looks like a fence\nbut is prose\n".into(),
            metadata: Default::default(),
            start_line: 1,
            end_line: 2,
        };
        assert_eq!(
            wrap_admonition(&block, AdmonitionType::Note, None),
            "::::{note}\n::: looks like a fence\nbut is prose\n::::"
        );
    }

    #[test]
    fn backtick_fence_outgrows_inner_runs() {
        let block = ContentBlock {
            id: BlockId(0),
            block_type: BlockType::Paragraph,
            content: "let s = ```x```;".into(),
            raw_content: "let s = ```x```;".into(),
            metadata: Default::default(),
            start_line: 1,
            end_line: 1,
        };
        assert_eq!(wrap_code(&block, None), "````\nlet s = ```x```;\n````");
    }

    #[test]
    fn crlf_blocks_keep_their_line_endings() {
        let raw = "```\r\ndef f(x):\r\n    return x\r\n```\r\n";
        let result = transform_content(raw, &config(&["code-block"], 0.65));
        assert_eq!(
            result.formatted_content,
            "```python\r\ndef f(x):\r\n    return x\r\n```\r\n"
        );
    }

    #[test]
    fn crlf_heading_padding_matches_document_endings() {
        let result = transform_content(
            "Intro line\r\n# Heading\r\nBody text\r\n",
            &TransformationConfig::default(),
        );
        assert_eq!(
            result.formatted_content,
            "Intro line\r\n\r\n# Heading\r\n\r\nBody text\r\n"
        );
    }

    #[test]
    fn truncated_input_is_flagged_not_failed() {
        let result =
            transform_content("Intro\n\n```\nunterminated", &TransformationConfig::default());
        assert!(result.truncated_at_eof);
        assert!(result.formatted_content.contains("unterminated"));
    }

    #[test]
    fn unknown_features_surface_as_warnings() {
        let result = transform_content("Plain text.", &config(&["sparkles"], 0.65));
        assert_eq!(result.warnings, vec!["unknown feature 'sparkles' ignored".to_string()]);
    }

    #[test]
    fn applied_transformations_serialize_flat() {
        let result = transform_content(
            "Warning: never delete the root directory.",
            &config(&["warning"], 0.5),
        );
        let json = serde_json::to_value(&result.applied_transformations[0]).expect("serialize");
        assert_eq!(json["block_id"], "block-0");
        assert_eq!(json["kind"], "admonition");
        assert_eq!(json["type"], "warning");
        assert_eq!(json["source"], "rule_based");
        assert!(json.get("title").is_none());
    }
}
