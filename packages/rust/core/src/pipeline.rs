//! End-to-end `format` pipeline: validate → transform → verify.
//!
//! The engine and the verifier never fail on their own. This wrapper is
//! where a failed verdict becomes an error, if the caller asks for it.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, instrument};

use mystify_shared::{MystifyError, Result, TransformationConfig, VerificationConfig};

use crate::engine::{TransformationResult, transform_content};
use crate::verification::{VerificationResult, verify_preservation_with};

/// What to do when the formatted output fails verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Return [`MystifyError::Verification`].
    Strict,
    /// Return the outcome for the caller to inspect.
    #[default]
    Lenient,
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for VerifyMode {
    type Err = MystifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(MystifyError::validation(format!(
                "unknown verify mode '{other}' (expected strict or lenient)"
            ))),
        }
    }
}

/// A formatted document together with its preservation verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatOutcome {
    pub transformation: TransformationResult,
    pub verification: VerificationResult,
}

impl FormatOutcome {
    pub fn is_preserved(&self) -> bool {
        self.verification.is_preserved
    }
}

/// Format `raw` and verify the result.
///
/// Configuration is validated first. In [`VerifyMode::Strict`] a failed
/// verdict is returned as an error; in [`VerifyMode::Lenient`] it is
/// returned as data.
#[instrument(skip_all, fields(len = raw.len(), %mode))]
pub fn format_and_verify(
    raw: &str,
    config: &TransformationConfig,
    verification: &VerificationConfig,
    mode: VerifyMode,
) -> Result<FormatOutcome> {
    config.validate()?;
    verification.validate()?;

    let transformation = transform_content(raw, config);
    let verdict = verify_preservation_with(raw, &transformation.formatted_content, verification);

    info!(
        applied = transformation.applied_transformations.len(),
        preserved = verdict.is_preserved,
        "format complete"
    );

    enforce(mode, &verdict)?;

    Ok(FormatOutcome {
        transformation,
        verification: verdict,
    })
}

/// Turn a failed verdict into an error in strict mode.
fn enforce(mode: VerifyMode, verdict: &VerificationResult) -> Result<()> {
    if mode == VerifyMode::Strict && !verdict.is_preserved {
        return Err(MystifyError::verification(
            verdict.preservation_percentage,
            verdict.sentence_preservation_rate,
            verdict.issues.len(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
