//! Merging rule-based and externally supplied admonition suggestions.
//!
//! Both sources are normalized into [`ResolvedSuggestion`]s tagged with a
//! [`SuggestionSource`], then merged per block by source precedence:
//! an external suggestion always replaces a rule-based one for the same
//! block, regardless of confidence.

use std::collections::BTreeMap;

use tracing::debug;

use mystify_shared::{
    AdmonitionSuggestion, AdmonitionType, BlockId, ExternalSuggestion, ParsedContent,
    SuggestionSource,
};

/// A suggestion from either source, tied to a block of the current parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSuggestion {
    pub block_id: BlockId,
    pub admonition_type: AdmonitionType,
    pub title: Option<String>,
    pub confidence: f64,
    pub reason: String,
    pub source: SuggestionSource,
}

impl From<&AdmonitionSuggestion> for ResolvedSuggestion {
    fn from(s: &AdmonitionSuggestion) -> Self {
        Self {
            block_id: s.block_id,
            admonition_type: s.admonition_type,
            title: s.suggested_title.clone(),
            confidence: s.confidence,
            reason: s.reason.clone(),
            source: SuggestionSource::RuleBased,
        }
    }
}

/// Resolve external suggestions against the parse.
///
/// Suggestions whose id does not name a paragraph of this parse, or whose
/// type is not an admonition, are dropped without error.
pub fn resolve_external(
    external: &[ExternalSuggestion],
    parsed: &ParsedContent,
) -> Vec<ResolvedSuggestion> {
    external
        .iter()
        .filter_map(|s| {
            let Ok(block_id) = s.paragraph_id.parse::<BlockId>() else {
                debug!(id = %s.paragraph_id, "ignoring external suggestion with malformed id");
                return None;
            };
            if !parsed.block(block_id).is_some_and(|b| b.is_paragraph()) {
                debug!(%block_id, "ignoring external suggestion for non-paragraph block");
                return None;
            }
            let Ok(admonition_type) = s.admonition_type.parse::<AdmonitionType>() else {
                debug!(kind = %s.admonition_type, "ignoring external suggestion with unknown type");
                return None;
            };
            let title = s
                .title
                .as_deref()
                .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|t| !t.is_empty());

            Some(ResolvedSuggestion {
                block_id,
                admonition_type,
                title,
                confidence: s.confidence,
                reason: s.reason.clone(),
                source: SuggestionSource::External,
            })
        })
        .collect()
}

/// Merge suggestions into one winner per block.
///
/// Higher [`SuggestionSource::precedence`] replaces lower; among equal
/// precedence the first suggestion seen is kept.
pub fn merge_suggestions<I>(suggestions: I) -> BTreeMap<BlockId, ResolvedSuggestion>
where
    I: IntoIterator<Item = ResolvedSuggestion>,
{
    let mut merged: BTreeMap<BlockId, ResolvedSuggestion> = BTreeMap::new();

    for suggestion in suggestions {
        match merged.get(&suggestion.block_id) {
            Some(existing) if existing.source.precedence() >= suggestion.source.precedence() => {}
            _ => {
                merged.insert(suggestion.block_id, suggestion);
            }
        }
    }

    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
