//! Line-oriented content parser.
//!
//! Splits raw text into an ordered sequence of typed [`ContentBlock`]s. The
//! parser never fails: regions left open at end of input are closed
//! implicitly and reported through [`ParsedContent::truncated_at_eof`].
//!
//! Every input byte lands in exactly one block's `raw_content`, so
//! concatenating the blocks reproduces the input.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use mystify_shared::{
    BlockIdSequence, BlockMetadata, BlockType, ContentBlock, ListType, MathType, ParsedContent,
};

use crate::strip::count_words;

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").expect("valid regex"));

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(:{2,}|`{3,})\{([^}\s]+)\}(.*)$").expect("valid regex")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t].*)?$").expect("valid regex"));

static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}((?:>[ \t]?)+)").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:([-*+])|(\d{1,9})[.)])[ \t]+\S").expect("valid regex")
});

static TABLE_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|.*\|\s*$").expect("valid regex"));

/// Parse raw text into blocks with a fresh id sequence.
#[instrument(skip_all, fields(len = raw.len()))]
pub fn parse(raw: &str) -> ParsedContent {
    let mut ids = BlockIdSequence::new();
    parse_with_ids(raw, &mut ids)
}

/// Parse raw text, drawing block ids from a caller-owned sequence.
pub fn parse_with_ids(raw: &str, ids: &mut BlockIdSequence) -> ParsedContent {
    let mut parser = ContentParser::new(ids);
    let mut total_lines = 0;

    for (idx, line) in raw.split_inclusive('\n').enumerate() {
        parser.feed(idx + 1, line);
        total_lines = idx + 1;
    }

    let truncated_at_eof = parser.mode != Mode::Normal;
    let blocks = parser.finish();

    debug!(
        blocks = blocks.len(),
        total_lines, truncated_at_eof, "parse complete"
    );

    ParsedContent {
        blocks,
        raw_content: raw.to_string(),
        total_lines,
        word_count: count_words(raw),
        truncated_at_eof,
    }
}

/// Body lines of a fenced code, directive, or math block (without the
/// opening and closing fence lines).
pub fn fenced_body(block: &ContentBlock) -> String {
    let lines: Vec<&str> = block.content.split('\n').collect();
    if lines.len() <= 1 {
        return String::new();
    }
    let end = if block.metadata.unterminated {
        lines.len()
    } else {
        lines.len() - 1
    };
    lines[1..end].join("\n")
}

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathCloser {
    Dollars,
    Fence { fence_char: char, fence_len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    InFencedCode { fence_char: char, fence_len: usize },
    InDirective { fence_char: char, fence_len: usize, nesting: usize },
    InMathBlock { closer: MathCloser },
}

/// A block still accumulating lines.
#[derive(Debug)]
struct OpenBlock {
    block_type: BlockType,
    raw: String,
    metadata: BlockMetadata,
    start_line: usize,
    end_line: usize,
}

struct ContentParser<'a> {
    ids: &'a mut BlockIdSequence,
    blocks: Vec<ContentBlock>,
    current: Option<OpenBlock>,
    mode: Mode,
}

impl<'a> ContentParser<'a> {
    fn new(ids: &'a mut BlockIdSequence) -> Self {
        Self {
            ids,
            blocks: Vec::new(),
            current: None,
            mode: Mode::Normal,
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) {
        let text = line_text(line);

        match self.mode {
            Mode::Normal => self.feed_normal(line_no, line, text),
            Mode::InFencedCode {
                fence_char,
                fence_len,
            } => {
                self.append(line_no, line);
                if closes_code_fence(text, fence_char, fence_len) {
                    self.close_region();
                }
            }
            Mode::InDirective {
                fence_char,
                fence_len,
                nesting,
            } => {
                self.append(line_no, line);
                match fence_marker(text) {
                    Some(marker) if marker.fence_char == fence_char && marker.len == fence_len => {
                        if marker.has_info {
                            self.mode = Mode::InDirective {
                                fence_char,
                                fence_len,
                                nesting: nesting + 1,
                            };
                        } else if nesting == 0 {
                            self.close_region();
                        } else {
                            self.mode = Mode::InDirective {
                                fence_char,
                                fence_len,
                                nesting: nesting - 1,
                            };
                        }
                    }
                    _ => {}
                }
            }
            Mode::InMathBlock { closer } => {
                self.append(line_no, line);
                let closed = match closer {
                    MathCloser::Dollars => text.trim_end().ends_with("$$"),
                    MathCloser::Fence {
                        fence_char,
                        fence_len,
                    } => fence_marker(text).is_some_and(|m| {
                        m.fence_char == fence_char && m.len == fence_len && !m.has_info
                    }),
                };
                if closed {
                    self.close_region();
                }
            }
        }
    }

    /// Classify a line outside any fenced region. Precedence matters here.
    fn feed_normal(&mut self, line_no: usize, line: &str, text: &str) {
        if let Some(caps) = CODE_FENCE_RE.captures(text) {
            let fence = &caps[1];
            let info = caps[2].trim();
            let backtick_info_ok = !(fence.starts_with('`') && info.contains('`'));
            if !info.starts_with('{') && backtick_info_ok {
                let fence_char = fence.chars().next().unwrap_or('`');
                let metadata = BlockMetadata {
                    language: info.split_whitespace().next().map(str::to_string),
                    is_fenced: Some(true),
                    fence_len: Some(fence.len()),
                    ..BlockMetadata::default()
                };
                self.start(BlockType::Code, metadata, line_no, line);
                self.mode = Mode::InFencedCode {
                    fence_char,
                    fence_len: fence.len(),
                };
                return;
            }
        }

        if let Some(caps) = DIRECTIVE_RE.captures(text) {
            let fence = &caps[1];
            let name = caps[2].to_string();
            let fence_char = fence.chars().next().unwrap_or(':');
            let fence_len = fence.len();

            if name == "math" {
                let metadata = BlockMetadata {
                    math_type: Some(MathType::Directive),
                    directive: Some(name),
                    fence_len: Some(fence_len),
                    ..BlockMetadata::default()
                };
                self.start(BlockType::Math, metadata, line_no, line);
                self.mode = Mode::InMathBlock {
                    closer: MathCloser::Fence {
                        fence_char,
                        fence_len,
                    },
                };
            } else {
                let metadata = BlockMetadata {
                    directive: Some(name),
                    fence_len: Some(fence_len),
                    ..BlockMetadata::default()
                };
                self.start(BlockType::Directive, metadata, line_no, line);
                self.mode = Mode::InDirective {
                    fence_char,
                    fence_len,
                    nesting: 0,
                };
            }
            return;
        }

        let trimmed = text.trim();
        if trimmed.starts_with("$$") {
            let metadata = BlockMetadata {
                math_type: Some(MathType::Display),
                ..BlockMetadata::default()
            };
            self.start(BlockType::Math, metadata, line_no, line);
            let single_line = trimmed.len() >= 4 && trimmed.ends_with("$$");
            if !single_line {
                self.mode = Mode::InMathBlock {
                    closer: MathCloser::Dollars,
                };
            }
            return;
        }

        if trimmed.is_empty() {
            self.extend_or_start(BlockType::Empty, BlockMetadata::default(), line_no, line);
            return;
        }

        if let Some(caps) = HEADING_RE.captures(text) {
            let metadata = BlockMetadata {
                heading_level: Some(caps[1].len() as u8),
                ..BlockMetadata::default()
            };
            self.start(BlockType::Heading, metadata, line_no, line);
            return;
        }

        if let Some(caps) = QUOTE_RE.captures(text) {
            let depth = caps[1].matches('>').count();
            if let Some(open) = self.current_of(BlockType::Quote) {
                let max = open.metadata.quote_depth.unwrap_or(0).max(depth);
                open.metadata.quote_depth = Some(max);
                self.append(line_no, line);
            } else {
                let metadata = BlockMetadata {
                    quote_depth: Some(depth),
                    ..BlockMetadata::default()
                };
                self.start(BlockType::Quote, metadata, line_no, line);
            }
            return;
        }

        if let Some(caps) = LIST_ITEM_RE.captures(text) {
            let list_type = if caps.get(1).is_some() {
                ListType::Bullet
            } else {
                ListType::Numbered
            };
            let metadata = BlockMetadata {
                list_type: Some(list_type),
                ..BlockMetadata::default()
            };
            self.extend_or_start(BlockType::List, metadata, line_no, line);
            return;
        }

        if TABLE_ROW_RE.is_match(text) {
            self.extend_or_start(BlockType::Table, BlockMetadata::default(), line_no, line);
            return;
        }

        // Indented lines continue an open list item.
        if text.starts_with("  ") || text.starts_with('\t') {
            if self.current_of(BlockType::List).is_some() {
                self.append(line_no, line);
                return;
            }
        }

        self.extend_or_start(BlockType::Paragraph, BlockMetadata::default(), line_no, line);
    }

    fn current_of(&mut self, block_type: BlockType) -> Option<&mut OpenBlock> {
        self.current
            .as_mut()
            .filter(|open| open.block_type == block_type)
    }

    /// Append to the open block if it has the same type, else start a new one.
    fn extend_or_start(
        &mut self,
        block_type: BlockType,
        metadata: BlockMetadata,
        line_no: usize,
        line: &str,
    ) {
        if self.current_of(block_type).is_some() {
            self.append(line_no, line);
        } else {
            self.start(block_type, metadata, line_no, line);
        }
    }

    fn start(
        &mut self,
        block_type: BlockType,
        metadata: BlockMetadata,
        line_no: usize,
        line: &str,
    ) {
        self.flush();
        self.current = Some(OpenBlock {
            block_type,
            raw: line.to_string(),
            metadata,
            start_line: line_no,
            end_line: line_no,
        });
    }

    fn append(&mut self, line_no: usize, line: &str) {
        if let Some(open) = self.current.as_mut() {
            open.raw.push_str(line);
            open.end_line = line_no;
        }
    }

    /// Close the fenced region the parser is inside and return to normal mode.
    fn close_region(&mut self) {
        self.flush();
        self.mode = Mode::Normal;
    }

    fn flush(&mut self) {
        let Some(open) = self.current.take() else {
            return;
        };
        let content = strip_terminator(&open.raw).to_string();
        self.blocks.push(ContentBlock {
            id: self.ids.next_id(),
            block_type: open.block_type,
            content,
            raw_content: open.raw,
            metadata: open.metadata,
            start_line: open.start_line,
            end_line: open.end_line,
        });
    }

    fn finish(mut self) -> Vec<ContentBlock> {
        if self.mode != Mode::Normal {
            if let Some(open) = self.current.as_mut() {
                open.metadata.unterminated = true;
            }
        }
        self.flush();
        self.blocks
    }
}

// ---------------------------------------------------------------------------
// Line helpers
// ---------------------------------------------------------------------------

/// A line without its `\n` or `\r\n` terminator.
fn line_text(line: &str) -> &str {
    strip_terminator(line)
}

fn strip_terminator(s: &str) -> &str {
    match s.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => s,
    }
}

/// A run of fence characters at the start of a line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FenceMarker {
    pub fence_char: char,
    pub len: usize,
    /// Something other than whitespace follows the run (a language or `{name}`).
    pub has_info: bool,
}

/// Recognize a backtick, tilde, or colon fence run (at least 3 backticks or
/// tildes, at least 2 colons) at the start of a line.
pub(crate) fn fence_marker(text: &str) -> Option<FenceMarker> {
    let trimmed = text.trim_start();
    let fence_char = trimmed.chars().next()?;
    let min = match fence_char {
        '`' | '~' => 3,
        ':' => 2,
        _ => return None,
    };
    let len = trimmed.chars().take_while(|&c| c == fence_char).count();
    if len < min {
        return None;
    }
    let rest = &trimmed[len * fence_char.len_utf8()..];
    Some(FenceMarker {
        fence_char,
        len,
        has_info: !rest.trim().is_empty(),
    })
}

/// A code fence closes on a bare run of the same character at least as long as the opener.
pub(crate) fn closes_code_fence(text: &str, fence_char: char, fence_len: usize) -> bool {
    fence_marker(text)
        .is_some_and(|m| m.fence_char == fence_char && m.len >= fence_len && !m.has_info)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mystify_shared::BlockId;

    fn types(parsed: &ParsedContent) -> Vec<BlockType> {
        parsed.blocks.iter().map(|b| b.block_type).collect()
    }

    fn assert_reconstructs(raw: &str) {
        let parsed = parse(raw);
        assert_eq!(parsed.reconstruct(), raw, "reconstruction failed for {raw:?}");
        for block in &parsed.blocks {
            let stripped = block
                .raw_content
                .strip_suffix('\n')
                .map(|s| s.strip_suffix('\r').unwrap_or(s))
                .unwrap_or(&block.raw_content);
            assert_eq!(block.content, stripped);
        }
    }

    #[test]
    fn paragraph_empty_paragraph() {
        let parsed = parse("A\n\nB");
        assert_eq!(
            types(&parsed),
            vec![BlockType::Paragraph, BlockType::Empty, BlockType::Paragraph]
        );
        assert_eq!(parsed.blocks[0].content, "A");
        assert_eq!(parsed.blocks[1].content, "");
        assert_eq!(parsed.blocks[2].content, "B");
        assert_eq!(parsed.reconstruct(), "A\n\nB");
    }

    #[test]
    fn ids_are_unique_and_sequential() {
        let parsed = parse("# T\n\npara\n\n- item");
        let ids: Vec<BlockId> = parsed.blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, (0..ids.len() as u32).map(BlockId).collect::<Vec<_>>());
    }

    #[test]
    fn separate_parses_restart_ids() {
        let a = parse("one\n\ntwo");
        let b = parse("three");
        assert_eq!(a.blocks[0].id, BlockId(0));
        assert_eq!(b.blocks[0].id, BlockId(0));
    }

    #[test]
    fn caller_owned_sequence_continues() {
        let mut ids = BlockIdSequence::new();
        let first = parse_with_ids("a\n\nb", &mut ids);
        let second = parse_with_ids("c", &mut ids);
        assert_eq!(first.blocks.last().map(|b| b.id), Some(BlockId(2)));
        assert_eq!(second.blocks[0].id, BlockId(3));
    }

    #[test]
    fn multi_line_paragraph_accumulates() {
        let parsed = parse("line one\nline two\nline three\n");
        assert_eq!(parsed.blocks.len(), 1);
        assert_eq!(parsed.blocks[0].content, "line one\nline two\nline three");
        assert_eq!(parsed.blocks[0].start_line, 1);
        assert_eq!(parsed.blocks[0].end_line, 3);
        assert_eq!(parsed.total_lines, 3);
    }

    #[test]
    fn fenced_code_with_language() {
        let parsed = parse("```rust\nfn main() {}\n```\n");
        assert_eq!(types(&parsed), vec![BlockType::Code]);
        let meta = &parsed.blocks[0].metadata;
        assert_eq!(meta.language.as_deref(), Some("rust"));
        assert_eq!(meta.is_fenced, Some(true));
        assert!(!parsed.truncated_at_eof);
    }

    #[test]
    fn fenced_code_swallows_markdown_lines() {
        let raw = "```\n# not a heading\n- not a list\n\n```\nafter";
        let parsed = parse(raw);
        assert_eq!(types(&parsed), vec![BlockType::Code, BlockType::Paragraph]);
        assert_eq!(fenced_body(&parsed.blocks[0]), "# not a heading\n- not a list\n");
    }

    #[test]
    fn tilde_fence_needs_matching_char() {
        let parsed = parse("~~~\ncode\n```\nstill code\n~~~\n");
        assert_eq!(types(&parsed), vec![BlockType::Code]);
    }

    #[test]
    fn longer_closing_fence_closes_code() {
        let parsed = parse("```\ncode\n`````\ntext");
        assert_eq!(types(&parsed), vec![BlockType::Code, BlockType::Paragraph]);
    }

    #[test]
    fn colon_directive_is_one_block() {
        let raw = ":::{note}\nHello\n\n# inside\n:::\n";
        let parsed = parse(raw);
        assert_eq!(types(&parsed), vec![BlockType::Directive]);
        assert_eq!(parsed.blocks[0].metadata.directive.as_deref(), Some("note"));
        assert_eq!(parsed.blocks[0].metadata.fence_len, Some(3));
    }

    #[test]
    fn backtick_brace_is_directive_not_code() {
        let parsed = parse("```{warning}\nCareful\n```\n");
        assert_eq!(types(&parsed), vec![BlockType::Directive]);
        assert_eq!(parsed.blocks[0].metadata.directive.as_deref(), Some("warning"));
    }

    #[test]
    fn nested_directives_close_by_length() {
        let raw = "::::{grid}\n:::{card}\nOne\n:::\n:::{card}\nTwo\n:::\n::::\nafter\n";
        let parsed = parse(raw);
        assert_eq!(types(&parsed), vec![BlockType::Directive, BlockType::Paragraph]);
        assert_eq!(parsed.blocks[0].end_line, 8);
        assert_eq!(parsed.blocks[1].content, "after");
    }

    #[test]
    fn same_length_nested_directive_tracks_nesting() {
        let raw = ":::{tip}\n:::{note}\ninner\n:::\nstill tip\n:::\nafter";
        let parsed = parse(raw);
        assert_eq!(types(&parsed), vec![BlockType::Directive, BlockType::Paragraph]);
        assert_eq!(parsed.blocks[0].end_line, 6);
    }

    #[test]
    fn dollar_math_block() {
        let parsed = parse("$$\nE = mc^2\n$$\ntext");
        assert_eq!(types(&parsed), vec![BlockType::Math, BlockType::Paragraph]);
        assert_eq!(parsed.blocks[0].metadata.math_type, Some(MathType::Display));
    }

    #[test]
    fn single_line_dollar_math() {
        let parsed = parse("$$ a^2 + b^2 $$\nnext");
        assert_eq!(types(&parsed), vec![BlockType::Math, BlockType::Paragraph]);
    }

    #[test]
    fn math_directive_is_math_block() {
        let parsed = parse("```{math}\n\\int_0^1 x\\,dx\n```\n");
        assert_eq!(types(&parsed), vec![BlockType::Math]);
        assert_eq!(parsed.blocks[0].metadata.math_type, Some(MathType::Directive));
    }

    #[test]
    fn headings_are_single_line_blocks() {
        let parsed = parse("# One\n## Two\n####### seven hashes\n#hashtag");
        assert_eq!(
            types(&parsed),
            vec![BlockType::Heading, BlockType::Heading, BlockType::Paragraph]
        );
        assert_eq!(parsed.blocks[1].metadata.heading_level, Some(2));
        assert_eq!(parsed.blocks[2].content, "####### seven hashes\n#hashtag");
    }

    #[test]
    fn nested_quote_depth() {
        let parsed = parse("> outer\n> > inner\n>> tight");
        assert_eq!(types(&parsed), vec![BlockType::Quote]);
        assert_eq!(parsed.blocks[0].metadata.quote_depth, Some(2));
    }

    #[test]
    fn list_items_and_continuations() {
        let parsed = parse("- one\n- two\n  continued\n1. numbered\n\n3) other");
        assert_eq!(types(&parsed), vec![BlockType::List, BlockType::Empty, BlockType::List]);
        assert_eq!(parsed.blocks[0].metadata.list_type, Some(ListType::Bullet));
        assert!(parsed.blocks[0].content.contains("continued"));
        assert_eq!(parsed.blocks[2].metadata.list_type, Some(ListType::Numbered));
    }

    #[test]
    fn table_rows_group() {
        let parsed = parse("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert_eq!(types(&parsed), vec![BlockType::Table]);
        assert_eq!(parsed.blocks[0].end_line, 3);
    }

    #[test]
    fn consecutive_empty_lines_merge() {
        let parsed = parse("a\n\n\n\nb");
        assert_eq!(
            types(&parsed),
            vec![BlockType::Paragraph, BlockType::Empty, BlockType::Paragraph]
        );
        assert_eq!(parsed.blocks[1].content, "\n\n");
    }

    #[test]
    fn unterminated_fence_closes_at_eof() {
        let raw = "intro\n\n```python\nprint('x')\n";
        let parsed = parse(raw);
        assert!(parsed.truncated_at_eof);
        let code = parsed.blocks.last().expect("code block");
        assert_eq!(code.block_type, BlockType::Code);
        assert!(code.metadata.unterminated);
        assert_eq!(fenced_body(code), "print('x')");
        assert_eq!(parsed.reconstruct(), raw);
    }

    #[test]
    fn unterminated_directive_and_math_close_at_eof() {
        assert!(parse(":::{note}\nnever closed").truncated_at_eof);
        assert!(parse("$$\nx = 1").truncated_at_eof);
        assert!(!parse("plain").truncated_at_eof);
    }

    #[test]
    fn empty_input() {
        let parsed = parse("");
        assert!(parsed.blocks.is_empty());
        assert_eq!(parsed.total_lines, 0);
        assert_eq!(parsed.word_count, 0);
    }

    #[test]
    fn reconstruction_law_holds() {
        for raw in [
            "A\n\nB",
            "A\n",
            "\n\n\n",
            "# Title\r\n\r\nBody text\r\n",
            "- a\n- b\n\n> q\n\n| x |\n",
            "```\nunterminated",
            "::::{grid}\n:::{card}\nx\n:::\n",
            "$$\n\\frac{1}{2}\n$$",
            "text with trailing spaces   \n   \n",
            "no newline at end",
        ] {
            assert_reconstructs(raw);
        }
    }

    #[test]
    fn word_count_ignores_markup() {
        let parsed = parse(":::{note}\nHello **world**\n:::\n\n# Title here\n");
        assert_eq!(parsed.word_count, 4);
    }
}
