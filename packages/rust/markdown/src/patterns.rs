//! Stateless pattern detectors over parsed blocks.
//!
//! Detectors only annotate: they return [`DetectedPattern`]s and never touch
//! block content. Thresholds are deliberately conservative so that prose
//! which merely *talks about* code, lists, or math is left alone.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

use mystify_shared::{
    BlockType, ContentBlock, DetectedPattern, ListType, ParsedContent, PatternType,
};

use crate::languages::detect_language;
use crate::parser::fenced_body;

// ---------------------------------------------------------------------------
// Unformatted code
// ---------------------------------------------------------------------------

/// Number of independent indicators a paragraph needs before it counts as code.
pub const MIN_CODE_INDICATORS: usize = 2;

const CODE_INDICATOR_COUNT: usize = 5;

static CODE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(function|const|let|var|def|class|import|return|public|private|static|void|fn|impl|struct|elif|lambda|println|printf|console|async|await|namespace|package)\b",
    )
    .expect("valid regex")
});

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(//|/\*|\*/|#\s|--\s|<!--)|\s//\s").expect("valid regex")
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\b[A-Za-z_]\w*(\.\w+)*\([^()]*\)\s*(;|\{|$)").expect("valid regex")
});

/// Verdict of [`detect_unformatted_code`].
#[derive(Debug, Clone, PartialEq)]
pub struct CodeDetection {
    pub is_code: bool,
    pub language: Option<String>,
    pub confidence: f64,
    /// Names of the indicators that fired.
    pub indicators: Vec<&'static str>,
}

/// Decide whether a prose paragraph is really unfenced code.
///
/// Five independent indicators are checked (bracket density, keywords,
/// indentation, comment syntax, call syntax); at least
/// [`MIN_CODE_INDICATORS`] must fire.
pub fn detect_unformatted_code(text: &str) -> CodeDetection {
    let mut indicators = Vec::new();

    let non_ws = text.chars().filter(|c| !c.is_whitespace()).count();
    let brackets = text.chars().filter(|c| "{}[]();".contains(*c)).count();
    if brackets >= 4 && non_ws > 0 && brackets as f64 / non_ws as f64 >= 0.05 {
        indicators.push("brackets");
    }

    let mut keywords: Vec<&str> = CODE_KEYWORD_RE.find_iter(text).map(|m| m.as_str()).collect();
    keywords.sort_unstable();
    keywords.dedup();
    if keywords.len() >= 2 {
        indicators.push("keywords");
    }

    let lines: Vec<&str> = text.lines().collect();
    if lines.len() >= 2
        && lines
            .iter()
            .any(|l| l.starts_with("    ") || l.starts_with('\t'))
    {
        indicators.push("indentation");
    }

    if COMMENT_RE.is_match(text) {
        indicators.push("comments");
    }

    if CALL_RE.is_match(text) {
        indicators.push("calls");
    }

    let count = indicators.len();
    let is_code = count >= MIN_CODE_INDICATORS;
    let (language, confidence) = if is_code {
        let confidence = (count as f64 / CODE_INDICATOR_COUNT as f64 + 0.2).min(1.0);
        (detect_language(text).map(|g| g.language), confidence)
    } else {
        (None, count as f64 / CODE_INDICATOR_COUNT as f64)
    };

    CodeDetection {
        is_code,
        language,
        confidence,
        indicators,
    }
}

// ---------------------------------------------------------------------------
// Lists, quotes, math
// ---------------------------------------------------------------------------

static LOOSE_BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-*+•◦▪‣–])\s+\S").expect("valid regex"));

static LOOSE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,3}|[a-zA-Z])[.)]\s+\S").expect("valid regex")
});

/// A paragraph whose lines are mostly bullet- or number-shaped.
pub fn detect_list(text: &str) -> Option<(ListType, f64)> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return None;
    }

    let bullets = lines.iter().filter(|l| LOOSE_BULLET_RE.is_match(l)).count();
    let numbered = lines.iter().filter(|l| LOOSE_NUMBER_RE.is_match(l)).count();
    let ratio = (bullets + numbered) as f64 / lines.len() as f64;
    if ratio <= 0.5 {
        return None;
    }

    let list_type = if bullets >= numbered {
        ListType::Bullet
    } else {
        ListType::Numbered
    };
    Some((list_type, ratio.min(1.0)))
}

static ATTRIBUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(—|--|–)\s*\S").expect("valid regex"));

const OPENING_QUOTES: [char; 4] = ['"', '“', '«', '„'];
const CLOSING_QUOTES: [char; 3] = ['"', '”', '»'];

/// A paragraph that reads like a quotation, optionally with an attribution line.
pub fn detect_quote(text: &str) -> Option<f64> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }

    let has_attribution = lines.iter().any(|l| ATTRIBUTION_RE.is_match(l));
    let quoted_lines = lines
        .iter()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with(OPENING_QUOTES) || ATTRIBUTION_RE.is_match(t)
        })
        .count();
    let ratio = quoted_lines as f64 / lines.len() as f64;

    let body = text.trim();
    let fully_quoted = body.starts_with(OPENING_QUOTES)
        && lines
            .iter()
            .rev()
            .find(|l| !ATTRIBUTION_RE.is_match(l))
            .is_some_and(|l| l.trim_end().trim_end_matches(['.', ',']).ends_with(CLOSING_QUOTES))
        && body.split_whitespace().count() >= 5;

    if ratio > 0.5 && (lines.len() >= 2 || fully_quoted) {
        let boost = if has_attribution { 0.2 } else { 0.0 };
        Some((0.5 + boost + ratio * 0.2).min(1.0))
    } else if fully_quoted {
        Some(if has_attribution { 0.8 } else { 0.6 })
    } else {
        None
    }
}

static MATH_SIGNALS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\\(frac|sqrt|sum|int|prod|lim|alpha|beta|gamma|delta|theta|lambda|sigma|pi|infty|cdot|times|leq|geq|neq|partial)\b",
        r"[\^_]\{[^}]*\}",
        r"\$[^$\n]+\$",
        r"\\begin\{(equation|align|matrix|cases)\*?\}",
        r"\b[a-zA-Z]\s*\^\s*\d",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static INLINE_MATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[^$\n]+\$").expect("valid regex"));

/// LaTeX-flavoured math in a paragraph. Returns `(is_display, confidence)`.
pub fn detect_math(text: &str) -> Option<(bool, f64)> {
    let count = MATH_SIGNALS.iter().filter(|re| re.is_match(text)).count();
    if count < 2 {
        return None;
    }
    let is_display = !INLINE_MATH_RE.is_match(text);
    Some(is_display).map(|display| (display, (0.3 + 0.15 * count as f64).min(1.0)))
}

// ---------------------------------------------------------------------------
// Headings, tables, emphasis
// ---------------------------------------------------------------------------

/// A short standalone line that looks like an unmarked heading.
pub fn detect_heading(text: &str) -> Option<f64> {
    let line = text.trim();
    if line.contains('\n') || line.is_empty() {
        return None;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 8 {
        return None;
    }
    if line.ends_with(['.', '!', '?', ',', ';', ':']) {
        return None;
    }
    if !line.chars().next().is_some_and(char::is_uppercase) {
        return None;
    }

    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase());
    let title_case = words
        .iter()
        .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 4)
        .all(|w| w.chars().next().is_some_and(char::is_uppercase));

    if all_caps {
        Some(0.75)
    } else if title_case && words.len() >= 2 {
        Some(0.6)
    } else {
        None
    }
}

static COLUMN_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+| {2,}").expect("valid regex"));

/// Lines with a consistent number of tab- or space-aligned columns.
pub fn detect_table(text: &str) -> Option<(usize, f64)> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return None;
    }
    let columns: Vec<usize> = lines
        .iter()
        .map(|l| COLUMN_SPLIT_RE.split(l.trim()).filter(|c| !c.is_empty()).count())
        .collect();
    let first = columns[0];
    if first >= 2 && columns.iter().all(|&c| c == first) {
        Some((first, 0.7))
    } else {
        None
    }
}

static SHOUTED_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{4,}\b").expect("valid regex"));

const COMMON_ACRONYMS: &[&str] = &[
    "HTTP", "HTTPS", "JSON", "HTML", "YAML", "TOML", "UUID", "ASCII", "UTF8", "REST", "CRUD",
    "TODO", "NOTE", "FIXME",
];

/// ALL-CAPS words used for emphasis inside otherwise mixed-case prose.
pub fn detect_emphasis(text: &str) -> Option<(Vec<String>, f64)> {
    let has_lowercase = text.chars().any(char::is_lowercase);
    if !has_lowercase {
        return None;
    }
    let mut words: Vec<String> = SHOUTED_WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|w| !COMMON_ACRONYMS.contains(&w.as_str()))
        .collect();
    let mut seen = BTreeSet::new();
    words.retain(|w| seen.insert(w.clone()));
    if words.is_empty() {
        None
    } else {
        Some((words, 0.5))
    }
}

// ---------------------------------------------------------------------------
// Links and images
// ---------------------------------------------------------------------------

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[[^\]]*\]\([^)]*\)|<https?://[^>\s]+>|`[^`]*`").expect("valid regex")
});

static BARE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\[\]]+").expect("valid regex"));

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// A bare URL found outside existing link syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct BareUrl {
    pub url: String,
    pub is_image: bool,
}

/// Valid bare URLs not already wrapped in link, autolink, or code syntax.
pub fn detect_bare_urls(text: &str) -> Vec<BareUrl> {
    let without_links = MARKDOWN_LINK_RE.replace_all(text, " ");
    BARE_URL_RE
        .find_iter(&without_links)
        .filter_map(|m| {
            let candidate = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
            let parsed = Url::parse(candidate).ok()?;
            parsed.host_str()?;
            let path = parsed.path().to_ascii_lowercase();
            Some(BareUrl {
                url: candidate.to_string(),
                is_image: IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Block-level driver
// ---------------------------------------------------------------------------

/// Run every detector over the parsed blocks, in block order.
#[instrument(skip_all, fields(blocks = parsed.blocks.len()))]
pub fn detect_patterns(parsed: &ParsedContent) -> Vec<DetectedPattern> {
    let mut patterns = Vec::new();

    for block in &parsed.blocks {
        match block.block_type {
            BlockType::Code => detect_code_block_language(block, &mut patterns),
            BlockType::Paragraph => detect_paragraph_patterns(block, &mut patterns),
            _ => {}
        }
    }

    debug!(patterns = patterns.len(), "pattern detection complete");
    patterns
}

fn detect_code_block_language(block: &ContentBlock, out: &mut Vec<DetectedPattern>) {
    if block.metadata.language.is_some() {
        return;
    }
    let Some(guess) = detect_language(&fenced_body(block)) else {
        return;
    };
    let mut metadata = BTreeMap::new();
    metadata.insert("language".to_string(), guess.language.clone());
    out.push(DetectedPattern {
        block_id: block.id,
        pattern_type: PatternType::Code,
        confidence: guess.confidence,
        metadata,
        suggestion: Some(format!("Add language tag `{}`", guess.language)),
    });
}

fn detect_paragraph_patterns(block: &ContentBlock, out: &mut Vec<DetectedPattern>) {
    let text = block.content.as_str();
    let pattern = |pattern_type, confidence, metadata, suggestion: String| DetectedPattern {
        block_id: block.id,
        pattern_type,
        confidence,
        metadata,
        suggestion: Some(suggestion),
    };

    let code = detect_unformatted_code(text);
    if code.is_code {
        let mut metadata = BTreeMap::new();
        metadata.insert("indicators".to_string(), code.indicators.join(","));
        if let Some(language) = &code.language {
            metadata.insert("language".to_string(), language.clone());
        }
        out.push(pattern(
            PatternType::Code,
            code.confidence,
            metadata,
            "Wrap in a fenced code block".to_string(),
        ));
    }

    if let Some((list_type, confidence)) = detect_list(text) {
        let kind = match list_type {
            ListType::Bullet => "bullet",
            ListType::Numbered => "numbered",
        };
        out.push(pattern(
            PatternType::List,
            confidence,
            BTreeMap::from([("list_type".to_string(), kind.to_string())]),
            format!("Format as a {kind} Markdown list"),
        ));
    }

    if let Some(confidence) = detect_quote(text) {
        out.push(pattern(
            PatternType::Quote,
            confidence,
            BTreeMap::new(),
            "Format as a blockquote".to_string(),
        ));
    }

    if let Some((is_display, confidence)) = detect_math(text) {
        let math_type = if is_display { "display" } else { "inline" };
        out.push(pattern(
            PatternType::Math,
            confidence,
            BTreeMap::from([("math_type".to_string(), math_type.to_string())]),
            "Wrap in a math block".to_string(),
        ));
    }

    if let Some(confidence) = detect_heading(text) {
        out.push(pattern(
            PatternType::Heading,
            confidence,
            BTreeMap::new(),
            "Promote to a heading".to_string(),
        ));
    }

    if let Some((columns, confidence)) = detect_table(text) {
        out.push(pattern(
            PatternType::Table,
            confidence,
            BTreeMap::from([("columns".to_string(), columns.to_string())]),
            "Format as a Markdown table".to_string(),
        ));
    }

    for bare in detect_bare_urls(text) {
        let (pattern_type, confidence, suggestion) = if bare.is_image {
            (PatternType::Image, 0.85, format!("Embed as an image: ![]({})", bare.url))
        } else {
            (PatternType::Link, 0.9, format!("Wrap as an autolink: <{}>", bare.url))
        };
        out.push(pattern(
            pattern_type,
            confidence,
            BTreeMap::from([("url".to_string(), bare.url)]),
            suggestion,
        ));
    }

    if let Some((words, confidence)) = detect_emphasis(text) {
        out.push(pattern(
            PatternType::Emphasis,
            confidence,
            BTreeMap::from([("words".to_string(), words.join(","))]),
            "Use **bold** instead of capitals".to_string(),
        ));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
