//! Transformation engine and preservation check for mystify.
//!
//! This crate ties the parser and detectors from `mystify-markdown` into
//! end-to-end workflows: expand features, transform a document, and verify
//! that the result kept every sentence of the input.

pub mod engine;
pub mod features;
pub mod pipeline;
pub mod suggestions;
pub mod verification;

pub use engine::{
    AppliedTransformation, TransformationHint, TransformationKind, TransformationResult,
    transform_content,
};
pub use features::{CapabilitySet, ExpandedFeatures, expand_features};
pub use pipeline::{FormatOutcome, VerifyMode, format_and_verify};
pub use suggestions::{ResolvedSuggestion, merge_suggestions, resolve_external};
pub use verification::{
    IssueType, Severity, VerificationIssue, VerificationResult, verify_preservation,
    verify_preservation_with,
};
