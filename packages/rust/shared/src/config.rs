//! Application and transformation configuration for mystify.
//!
//! User config lives at `~/.mystify/mystify.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MystifyError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mystify.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mystify";

// ---------------------------------------------------------------------------
// Config structs (matching mystify.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Formatting defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Preservation check thresholds.
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Feature identifiers, coarse (`admonitions`) or fine (`warning`).
    #[serde(default = "default_features")]
    pub features: Vec<String>,

    /// Minimum rule-based admonition confidence.
    #[serde(default = "default_admonition_threshold")]
    pub admonition_confidence_threshold: f64,

    #[serde(default = "default_true")]
    pub enable_admonitions: bool,

    #[serde(default = "default_true")]
    pub enable_code_blocks: bool,

    #[serde(default = "default_true")]
    pub auto_detect_language: bool,

    /// Upper bound on rule-based admonitions per document.
    #[serde(default = "default_max_admonitions")]
    pub max_admonitions: usize,

    /// Minimum confidence before a prose paragraph is fenced as code.
    #[serde(default = "default_code_wrap_threshold")]
    pub code_wrap_threshold: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            features: default_features(),
            admonition_confidence_threshold: default_admonition_threshold(),
            enable_admonitions: true,
            enable_code_blocks: true,
            auto_detect_language: true,
            max_admonitions: default_max_admonitions(),
            code_wrap_threshold: default_code_wrap_threshold(),
        }
    }
}

fn default_features() -> Vec<String> {
    vec!["admonitions".into(), "code-blocks".into()]
}
fn default_admonition_threshold() -> f64 {
    0.65
}
fn default_true() -> bool {
    true
}
fn default_max_admonitions() -> usize {
    50
}
fn default_code_wrap_threshold() -> f64 {
    0.7
}

/// `[verification]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Minimum word preservation percentage for a pass.
    #[serde(default = "default_min_word_preservation")]
    pub min_word_preservation: f64,

    /// Minimum sentence preservation rate for a pass.
    #[serde(default = "default_min_sentence_preservation")]
    pub min_sentence_preservation: f64,

    /// Fraction of significant words that must survive for a rewrapped
    /// sentence to still count as present.
    #[serde(default = "default_token_overlap")]
    pub token_overlap_threshold: f64,

    /// Missing sentences reported individually before aggregating.
    #[serde(default = "default_max_reported_missing")]
    pub max_reported_missing: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            min_word_preservation: default_min_word_preservation(),
            min_sentence_preservation: default_min_sentence_preservation(),
            token_overlap_threshold: default_token_overlap(),
            max_reported_missing: default_max_reported_missing(),
        }
    }
}

fn default_min_word_preservation() -> f64 {
    98.0
}
fn default_min_sentence_preservation() -> f64 {
    95.0
}
fn default_token_overlap() -> f64 {
    0.7
}
fn default_max_reported_missing() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Transformation config (runtime, merged from config + CLI flags + host data)
// ---------------------------------------------------------------------------

/// An admonition suggestion produced outside the engine (e.g. by a language model).
///
/// `paragraph_id` must name a block from the engine's own parse of the same
/// input; unmatched ids are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalSuggestion {
    #[serde(alias = "paragraphId")]
    pub paragraph_id: String,
    #[serde(rename = "type")]
    pub admonition_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_external_confidence")]
    pub confidence: f64,
}

fn default_external_confidence() -> f64 {
    1.0
}

/// Runtime transformation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(default = "default_features")]
    pub selected_features: Vec<String>,
    #[serde(default = "default_admonition_threshold")]
    pub admonition_confidence_threshold: f64,
    #[serde(default = "default_true")]
    pub enable_admonitions: bool,
    #[serde(default = "default_true")]
    pub enable_code_blocks: bool,
    #[serde(default = "default_true")]
    pub auto_detect_language: bool,
    #[serde(default = "default_max_admonitions")]
    pub max_admonitions: usize,
    #[serde(default = "default_code_wrap_threshold")]
    pub code_wrap_threshold: f64,
    #[serde(default)]
    pub external_suggestions: Vec<ExternalSuggestion>,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for TransformationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            selected_features: config.defaults.features.clone(),
            admonition_confidence_threshold: config.defaults.admonition_confidence_threshold,
            enable_admonitions: config.defaults.enable_admonitions,
            enable_code_blocks: config.defaults.enable_code_blocks,
            auto_detect_language: config.defaults.auto_detect_language,
            max_admonitions: config.defaults.max_admonitions,
            code_wrap_threshold: config.defaults.code_wrap_threshold,
            external_suggestions: Vec::new(),
        }
    }
}

impl TransformationConfig {
    /// Config with exactly these feature ids selected and everything else default.
    pub fn with_features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected_features: features.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Check numeric ranges.
    pub fn validate(&self) -> Result<()> {
        check_unit_range("admonition_confidence_threshold", self.admonition_confidence_threshold)?;
        check_unit_range("code_wrap_threshold", self.code_wrap_threshold)?;
        for suggestion in &self.external_suggestions {
            check_unit_range("external suggestion confidence", suggestion.confidence)?;
        }
        Ok(())
    }
}

impl VerificationConfig {
    pub fn validate(&self) -> Result<()> {
        check_percentage("min_word_preservation", self.min_word_preservation)?;
        check_percentage("min_sentence_preservation", self.min_sentence_preservation)?;
        check_unit_range("token_overlap_threshold", self.token_overlap_threshold)
    }
}

fn check_unit_range(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MystifyError::validation(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

fn check_percentage(name: &str, value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(MystifyError::validation(format!(
            "{name} must be between 0 and 100, got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mystify/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MystifyError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mystify/mystify.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MystifyError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        MystifyError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.verification.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MystifyError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MystifyError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MystifyError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("admonition_confidence_threshold"));
        assert!(toml_str.contains("token_overlap_threshold"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.admonition_confidence_threshold, 0.65);
        assert_eq!(parsed.verification.max_reported_missing, 10);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
features = ["warning", "note"]

[verification]
token_overlap_threshold = 0.8
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.features, vec!["warning", "note"]);
        assert!(config.defaults.enable_code_blocks);
        assert_eq!(config.verification.token_overlap_threshold, 0.8);
        assert_eq!(config.verification.min_word_preservation, 98.0);
    }

    #[test]
    fn transformation_config_from_app_config() {
        let app = AppConfig::default();
        let config = TransformationConfig::from(&app);
        assert_eq!(config.admonition_confidence_threshold, 0.65);
        assert_eq!(config.code_wrap_threshold, 0.7);
        assert!(config.external_suggestions.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn external_suggestion_accepts_camel_case_id() {
        let json = r#"{"paragraphId": "block-2", "type": "tip", "reason": "model said so", "confidence": 0.4}"#;
        let parsed: ExternalSuggestion = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.paragraph_id, "block-2");
        assert_eq!(parsed.admonition_type, "tip");
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = TransformationConfig::default();
        config.admonition_confidence_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("between 0 and 1"));
    }

    #[test]
    fn verification_percentages_validated() {
        let config = VerificationConfig {
            min_word_preservation: 120.0,
            ..VerificationConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(VerificationConfig::default().validate().is_ok());
    }
}
