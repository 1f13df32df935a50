//! Feature selection: expanding coarse feature ids into capabilities.
//!
//! Callers select features with a mix of coarse group ids (`admonitions`,
//! `code-blocks`, `all`) and fine ids (`warning`, `code-block`). Groups
//! expand through a fixed lookup table; the resulting fine ids are then
//! filtered by the config toggles into a [`CapabilitySet`].

use std::collections::BTreeSet;

use tracing::debug;

use mystify_shared::{AdmonitionType, TransformationConfig};

/// Fine capability id for fenced-code handling.
pub const CODE_BLOCK: &str = "code-block";

const ALL_ADMONITIONS: &[&str] = &[
    "danger", "error", "warning", "caution", "important", "attention", "tip", "hint", "note",
    "seealso",
];

const FEATURE_GROUPS: &[(&str, &[&str])] = &[
    ("admonitions", ALL_ADMONITIONS),
    ("basic-admonitions", &["note", "tip", "warning"]),
    ("code-blocks", &[CODE_BLOCK]),
];

/// Result of [`expand_features`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedFeatures {
    /// Fine capability ids, deduplicated.
    pub capabilities: BTreeSet<String>,
    /// Ids that matched neither a group nor a capability.
    pub unknown: Vec<String>,
}

fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_lowercase().replace('_', "-")
}

fn is_fine_id(id: &str) -> bool {
    id == CODE_BLOCK || id.parse::<AdmonitionType>().is_ok()
}

/// Expand coarse feature ids into fine capability ids.
pub fn expand_features<S: AsRef<str>>(selected: &[S]) -> ExpandedFeatures {
    let mut expanded = ExpandedFeatures::default();

    for raw in selected {
        let id = normalize_id(raw.as_ref());
        if id.is_empty() {
            continue;
        }

        if id == "all" {
            for (_, members) in FEATURE_GROUPS {
                expanded.capabilities.extend(members.iter().map(|m| m.to_string()));
            }
            continue;
        }

        if let Some((_, members)) = FEATURE_GROUPS.iter().find(|(group, _)| *group == id) {
            expanded.capabilities.extend(members.iter().map(|m| m.to_string()));
        } else if is_fine_id(&id) {
            let canonical = match id.parse::<AdmonitionType>() {
                Ok(kind) => kind.as_str().to_string(),
                Err(_) => id,
            };
            expanded.capabilities.insert(canonical);
        } else {
            expanded.unknown.push(raw.as_ref().to_string());
        }
    }

    expanded
}

/// Capabilities the engine may use for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub admonitions: BTreeSet<AdmonitionType>,
    /// Fence prose paragraphs that look like code.
    pub code_blocks: bool,
    /// Inject detected languages into untagged code fences.
    pub language_detection: bool,
}

impl CapabilitySet {
    /// Derive the capability set from a config. Unknown feature ids are
    /// returned as warnings rather than errors.
    pub fn resolve(config: &TransformationConfig) -> (Self, Vec<String>) {
        let expanded = expand_features(&config.selected_features);

        let admonitions: BTreeSet<AdmonitionType> = if config.enable_admonitions {
            expanded
                .capabilities
                .iter()
                .filter_map(|id| id.parse().ok())
                .collect()
        } else {
            BTreeSet::new()
        };
        let code_blocks = config.enable_code_blocks && expanded.capabilities.contains(CODE_BLOCK);

        let capabilities = Self {
            admonitions,
            code_blocks,
            language_detection: code_blocks && config.auto_detect_language,
        };

        let warnings = expanded
            .unknown
            .iter()
            .map(|id| format!("unknown feature '{id}' ignored"))
            .collect();

        debug!(
            admonitions = capabilities.admonitions.len(),
            code_blocks = capabilities.code_blocks,
            language_detection = capabilities.language_detection,
            "capabilities resolved"
        );

        (capabilities, warnings)
    }

    pub fn allows(&self, kind: AdmonitionType) -> bool {
        self.admonitions.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_expand_to_fine_ids() {
        let expanded = expand_features(&["admonitions", "code-blocks"]);
        assert_eq!(expanded.capabilities.len(), 11);
        assert!(expanded.capabilities.contains("seealso"));
        assert!(expanded.capabilities.contains(CODE_BLOCK));
        assert!(expanded.unknown.is_empty());
    }

    #[test]
    fn coarse_and_fine_ids_mix() {
        let expanded = expand_features(&["basic-admonitions", "Danger", "code_block"]);
        let ids: Vec<&str> = expanded.capabilities.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["code-block", "danger", "note", "tip", "warning"]);
    }

    #[test]
    fn see_also_spellings_are_canonical() {
        let expanded = expand_features(&["see-also"]);
        assert!(expanded.capabilities.contains("seealso"));
    }

    #[test]
    fn all_selects_everything() {
        assert_eq!(expand_features(&["all"]).capabilities.len(), 11);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let expanded = expand_features(&["callouts", "", "tip"]);
        assert_eq!(expanded.unknown, vec!["callouts".to_string()]);
        assert_eq!(expanded.capabilities.len(), 1);
    }

    #[test]
    fn toggles_filter_capabilities() {
        let mut config = TransformationConfig::with_features(["all"]);
        config.enable_admonitions = false;
        config.auto_detect_language = false;
        let (caps, warnings) = CapabilitySet::resolve(&config);
        assert!(caps.admonitions.is_empty());
        assert!(caps.code_blocks);
        assert!(!caps.language_detection);
        assert!(warnings.is_empty());
    }

    #[test]
    fn language_detection_needs_code_blocks() {
        let config = TransformationConfig::with_features(["warning"]);
        let (caps, _) = CapabilitySet::resolve(&config);
        assert!(caps.allows(AdmonitionType::Warning));
        assert!(!caps.allows(AdmonitionType::Danger));
        assert!(!caps.code_blocks);
        assert!(!caps.language_detection);
    }

    #[test]
    fn unknown_features_become_warnings() {
        let config = TransformationConfig::with_features(["tables"]);
        let (caps, warnings) = CapabilitySet::resolve(&config);
        assert_eq!(caps, CapabilitySet::default());
        assert_eq!(warnings, vec!["unknown feature 'tables' ignored".to_string()]);
    }
}
