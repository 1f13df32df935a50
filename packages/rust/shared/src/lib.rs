//! Shared types, error model, and configuration for mystify.
//!
//! This crate is the foundation depended on by all other mystify crates.
//! It provides:
//! - [`MystifyError`] — the unified error type
//! - Domain types ([`ContentBlock`], [`ParsedContent`], [`DetectedPattern`], [`AdmonitionSuggestion`])
//! - Configuration ([`AppConfig`], [`TransformationConfig`], [`VerificationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExternalSuggestion, TransformationConfig, VerificationConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{MystifyError, Result};
pub use types::{
    AdmonitionSuggestion, AdmonitionType, BlockId, BlockIdSequence, BlockMetadata, BlockType,
    ContentBlock, DetectedPattern, ListType, MathType, ParsedContent, PatternType,
    SuggestionSource,
};
