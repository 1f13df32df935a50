//! Core domain types shared by the parser, detectors, and engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MystifyError;

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

/// Identifier of a block within a single parse, rendered as `block-N`.
///
/// Ids are only meaningful relative to the parse that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = MystifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix("block-")
            .and_then(|n| n.parse().ok())
            .map(Self)
            .ok_or_else(|| MystifyError::validation(format!("invalid block id '{s}'")))
    }
}

impl TryFrom<String> for BlockId {
    type Error = MystifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.to_string()
    }
}

/// Parse-scoped generator of [`BlockId`]s.
///
/// One sequence is created per parse, so ids never leak between requests.
#[derive(Debug, Default)]
pub struct BlockIdSequence {
    next: u32,
}

impl BlockIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next unused id.
    pub fn next_id(&mut self) -> BlockId {
        let id = BlockId(self.next);
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// ContentBlock
// ---------------------------------------------------------------------------

/// Structural type of a parsed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    Code,
    List,
    Quote,
    Heading,
    Table,
    Math,
    Empty,
    /// A MyST directive region (`:::{name}` or ```` ```{name} ````), kept verbatim.
    Directive,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Code => "code",
            Self::List => "list",
            Self::Quote => "quote",
            Self::Heading => "heading",
            Self::Table => "table",
            Self::Math => "math",
            Self::Empty => "empty",
            Self::Directive => "directive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    Bullet,
    Numbered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathType {
    /// `$$ … $$` display math.
    Display,
    /// ```` ```{math} ```` or `:::{math}` directive.
    Directive,
}

/// Optional structural facts recorded by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<ListType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fenced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub math_type: Option<MathType>,
    /// Directive name for directive and directive-math blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    /// Length of the opening fence run (backticks, tildes, or colons).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fence_len: Option<usize>,
    /// The region reached end of input without its closing marker.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unterminated: bool,
}

/// A contiguous run of source lines classified by structural type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: BlockId,
    pub block_type: BlockType,
    /// Block text: the source lines without the final line terminator.
    pub content: String,
    /// Exact source slice, including the final line terminator if present.
    pub raw_content: String,
    #[serde(default)]
    pub metadata: BlockMetadata,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
}

impl ContentBlock {
    /// The line terminator that followed this block in the source (`""`, `"\n"` or `"\r\n"`).
    pub fn terminator(&self) -> &str {
        &self.raw_content[self.content.len()..]
    }

    pub fn is_paragraph(&self) -> bool {
        self.block_type == BlockType::Paragraph
    }

    /// Whitespace-separated word count of the block text.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Result of parsing one input document. Created fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedContent {
    pub blocks: Vec<ContentBlock>,
    pub raw_content: String,
    pub total_lines: usize,
    pub word_count: usize,
    /// A fence, directive, or math region was still open at end of input.
    #[serde(default)]
    pub truncated_at_eof: bool,
}

impl ParsedContent {
    /// Concatenate every block's source slice. Always equals `raw_content`.
    pub fn reconstruct(&self) -> String {
        self.blocks.iter().map(|b| b.raw_content.as_str()).collect()
    }

    pub fn block(&self, id: BlockId) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

// ---------------------------------------------------------------------------
// Detected patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Code,
    List,
    Quote,
    Table,
    Math,
    Heading,
    Link,
    Image,
    Emphasis,
}

/// A heuristic observation about a block. Never alters the block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub block_id: BlockId,
    pub pattern_type: PatternType,
    /// In `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

// ---------------------------------------------------------------------------
// Admonitions
// ---------------------------------------------------------------------------

/// MyST admonition variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmonitionType {
    Danger,
    Error,
    Warning,
    Caution,
    Important,
    Attention,
    Tip,
    Hint,
    Note,
    #[serde(rename = "seealso")]
    SeeAlso,
}

impl AdmonitionType {
    /// All variants, most severe first. Ties between types resolve in this order.
    pub const PRIORITY: [AdmonitionType; 10] = [
        Self::Danger,
        Self::Error,
        Self::Warning,
        Self::Caution,
        Self::Important,
        Self::Attention,
        Self::Tip,
        Self::Hint,
        Self::Note,
        Self::SeeAlso,
    ];

    /// Directive name as written after `:::{`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Danger => "danger",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Caution => "caution",
            Self::Important => "important",
            Self::Attention => "attention",
            Self::Tip => "tip",
            Self::Hint => "hint",
            Self::Note => "note",
            Self::SeeAlso => "seealso",
        }
    }

    /// Position in [`Self::PRIORITY`]; lower is more severe.
    pub fn rank(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|t| t == self)
            .unwrap_or(Self::PRIORITY.len())
    }
}

impl fmt::Display for AdmonitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmonitionType {
    type Err = MystifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        Self::PRIORITY
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| MystifyError::validation(format!("unknown admonition type '{s}'")))
    }
}

/// A proposal to wrap one paragraph block in an admonition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmonitionSuggestion {
    pub block_id: BlockId,
    #[serde(rename = "type")]
    pub admonition_type: AdmonitionType,
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_title: Option<String>,
}

/// Where an admonition suggestion came from.
///
/// When two sources target the same block, the one with the higher
/// [`SuggestionSource::precedence`] wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    RuleBased,
    External,
}

impl SuggestionSource {
    pub fn precedence(&self) -> u8 {
        match self {
            Self::RuleBased => 0,
            Self::External => 1,
        }
    }
}
