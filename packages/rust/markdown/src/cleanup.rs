//! Inter-block spacing normalization for formatted output.
//!
//! Each pass is a function `&str -> String` applied in sequence. Passes only
//! add or remove blank lines outside fenced regions, so code, directive and
//! math bodies are never touched. The pipeline is idempotent.

use std::sync::LazyLock;

use regex::Regex;

use crate::parser::{closes_code_fence, fence_marker};

/// Normalize spacing: blank lines around top-level headings, fences and
/// directives; runs of four or more blank lines collapse to two.
pub fn normalize_spacing(text: &str) -> String {
    let (body, trailing) = match text.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (text, ""),
    };

    let mut result = separate_blocks(body);
    result = collapse_blank_runs(&result);
    result.push_str(trailing);
    result
}

// ---------------------------------------------------------------------------
// Fence tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Frame {
    fence_char: char,
    len: usize,
    is_code: bool,
}

/// Where a line sits relative to fenced regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRole {
    /// Outside every fence.
    TopLevel,
    /// Opens a fence from the top level.
    Open,
    /// Closes the outermost fence.
    Close,
    /// Inside a fence (including nested openers and closers).
    Nested,
}

#[derive(Debug, Default)]
struct FenceTracker {
    stack: Vec<Frame>,
}

impl FenceTracker {
    fn observe(&mut self, line: &str) -> LineRole {
        let before = self.stack.len();
        self.step(line);
        match (before, self.stack.len()) {
            (0, 0) => LineRole::TopLevel,
            (0, _) => LineRole::Open,
            (_, 0) => LineRole::Close,
            _ => LineRole::Nested,
        }
    }

    fn step(&mut self, line: &str) {
        if let Some(top) = self.stack.last().copied() {
            if top.is_code {
                if closes_code_fence(line, top.fence_char, top.len) {
                    self.stack.pop();
                }
                return;
            }
        }

        let Some(marker) = fence_marker(line) else {
            return;
        };

        if !marker.has_info {
            if let Some(top) = self.stack.last() {
                if top.fence_char == marker.fence_char && top.len == marker.len {
                    self.stack.pop();
                    return;
                }
            }
        }

        let after_run = line
            .trim_start()
            .trim_start_matches(marker.fence_char)
            .trim_start();
        let is_directive = after_run.starts_with('{');
        if marker.fence_char == ':' && !is_directive {
            return;
        }
        self.stack.push(Frame {
            fence_char: marker.fence_char,
            len: marker.len,
            is_code: !is_directive,
        });
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

// ---------------------------------------------------------------------------
// Pass 1: Separate structural blocks
// ---------------------------------------------------------------------------

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}#{1,6}(\s|$)").expect("valid regex"));

/// Ensure a blank line before and after each top-level heading and fenced region.
fn separate_blocks(text: &str) -> String {
    let mut tracker = FenceTracker::default();
    let mut out: Vec<&str> = Vec::new();
    let mut blank_pending = false;

    for line in text.split('\n') {
        let role = tracker.observe(line);
        if is_blank(line) {
            blank_pending = false;
            out.push(line);
            continue;
        }

        let is_heading = role == LineRole::TopLevel && HEADING_RE.is_match(line);
        let wants_gap = blank_pending || role == LineRole::Open || is_heading;
        if let Some(prev) = out.last().copied().filter(|prev| wants_gap && !is_blank(prev)) {
            out.push(if prev.ends_with('\r') { "\r" } else { "" });
        }
        blank_pending = role == LineRole::Close || is_heading;
        out.push(line);
    }

    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Collapse blank runs
// ---------------------------------------------------------------------------

/// Top-level blank runs longer than this are collapsed.
const MAX_BLANK_RUN: usize = 3;
const COLLAPSED_BLANK_RUN: usize = 2;

/// Collapse runs of 4+ blank lines outside fences to exactly 2.
fn collapse_blank_runs(text: &str) -> String {
    let mut tracker = FenceTracker::default();
    let mut out: Vec<&str> = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let role = tracker.observe(line);
        if role == LineRole::TopLevel && is_blank(line) {
            run.push(line);
            continue;
        }
        flush_blank_run(&mut run, &mut out);
        out.push(line);
    }
    flush_blank_run(&mut run, &mut out);

    out.join("\n")
}

fn flush_blank_run<'a>(run: &mut Vec<&'a str>, out: &mut Vec<&'a str>) {
    let keep = if run.len() > MAX_BLANK_RUN {
        COLLAPSED_BLANK_RUN
    } else {
        run.len()
    };
    out.extend(run.drain(..).take(keep));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_get_surrounding_blank_lines() {
        assert_eq!(
            normalize_spacing("Intro\n# Title\nBody"),
            "Intro\n\n# Title\n\nBody"
        );
    }

    #[test]
    fn consecutive_headings_are_separated() {
        assert_eq!(normalize_spacing("# A\n## B\n"), "# A\n\n## B\n");
    }

    #[test]
    fn fences_get_surrounding_blank_lines() {
        let input = "Text\n```\ncode\n```\nAfter";
        assert_eq!(normalize_spacing(input), "Text\n\n```\ncode\n```\n\nAfter");
    }

    #[test]
    fn admonitions_get_surrounding_blank_lines() {
        let input = "Before\n:::{warning}\nCareful now.\n:::\nAfter\n";
        assert_eq!(
            normalize_spacing(input),
            "Before\n\n:::{warning}\nCareful now.\n:::\n\nAfter\n"
        );
    }

    #[test]
    fn crlf_padding_keeps_line_endings() {
        assert_eq!(
            normalize_spacing("a\r\n# b\r\nc\r\n"),
            "a\r\n\r\n# b\r\n\r\nc\r\n"
        );
        let fenced = normalize_spacing("Text\r\n```\r\ncode\r\n```\r\nAfter");
        assert_eq!(fenced, "Text\r\n\r\n```\r\ncode\r\n```\r\n\r\nAfter");
        assert!(!fenced.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn code_bodies_are_untouched() {
        let input = "```\n# not a heading\n\n\n\n\nstill code\n```";
        assert_eq!(normalize_spacing(input), input);
    }

    #[test]
    fn nested_directives_only_pad_the_outer_region() {
        let input = "::::{grid}\n:::{card}\nA\n:::\n::::\nNext";
        assert_eq!(
            normalize_spacing(input),
            "::::{grid}\n:::{card}\nA\n:::\n::::\n\nNext"
        );
    }

    #[test]
    fn long_blank_runs_collapse_to_two() {
        assert_eq!(normalize_spacing("a\n\n\n\n\nb"), "a\n\n\nb");
        // Three blank lines are left alone.
        assert_eq!(normalize_spacing("a\n\n\n\nb"), "a\n\n\n\nb");
    }

    #[test]
    fn trailing_newline_is_preserved() {
        assert_eq!(normalize_spacing("plain\n"), "plain\n");
        assert_eq!(normalize_spacing("plain"), "plain");
        assert_eq!(normalize_spacing(""), "");
    }

    #[test]
    fn unterminated_fence_is_not_padded_inside() {
        let input = "Lead\n```python\nx = 1\n# comment";
        assert_eq!(normalize_spacing(input), "Lead\n\n```python\nx = 1\n# comment");
    }

    #[test]
    fn idempotent_over_adversarial_inputs() {
        let inputs = [
            "",
            "\n",
            "\n\n\n\n\n\n",
            "# H\ntext\n```\ncode\n```\n# H2",
            "::::{grid}\n:::{card}\n# inner\n:::\n::::\n\n\n\n\n\nend",
            "Intro\n:::{note}\nbody\n:::\n:::{tip}\nbody\n:::\n",
            "```\nunterminated\n\n\n\n\n",
            "~~~\n```\n~~~\n# after",
            "a\r\n# b\r\nc\r\n",
            ":::\nbare colons\n:::\n",
        ];
        for input in inputs {
            let once = normalize_spacing(input);
            assert_eq!(normalize_spacing(&once), once, "input: {input:?}");
        }
    }
}
