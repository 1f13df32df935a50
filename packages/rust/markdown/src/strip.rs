//! Markup stripping: reduce Markdown/MyST text to bare prose.
//!
//! Used for word counting and by the preservation check. Stripping is
//! line-local, so wrapping a block in fences or directives never changes
//! how the wrapped lines themselves are reduced.

use std::sync::LazyLock;

use regex::Regex;

/// Fence, directive, and code-fence marker lines (dropped whole).
static MARKER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(`{3,}|~{3,}|:{2,})").expect("valid regex"));

/// Directive option lines such as `:class: tip`.
static DIRECTIVE_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:[A-Za-z][\w-]*:(\s|$)").expect("valid regex"));

/// Cross-reference target labels such as `(my-label)=`.
static LABEL_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\s*[\w.:-]+\s*\)=\s*$").expect("valid regex"));

static TABLE_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?$").expect("valid regex")
});

static THEMATIC_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\*\s*){3,}|(?:-\s*){3,}|(?:_\s*){3,})$").expect("valid regex")
});

static HEADING_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}(\s+|$)").expect("valid regex"));

static CLOSING_HASHES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+#+\s*$").expect("valid regex"));

static QUOTE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(>\s?)+").expect("valid regex"));

static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-*+]|\d{1,9}[.)])\s+(\[[ xX]\]\s+)?").expect("valid regex")
});

/// Ordered inline substitutions, applied left to right.
static INLINE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"!\[([^\]]*)\]\([^)]*\)", "$1"),
        (r"\[([^\]]+)\]\([^)]*\)", "$1"),
        (r"\[([^\]]+)\]\[[^\]]*\]", "$1"),
        (r"<(https?://[^>\s]+)>", "$1"),
        (r"\{[\w:-]+\}`([^`]*)`", "$1"),
        (r"`+([^`]*)`+", "$1"),
        (r"\*\*([^*]+)\*\*", "$1"),
        (r"__([^_]+)__", "$1"),
        (r"\*([^*\s][^*]*)\*", "$1"),
        (r"(^|[^\w])_([^_\s][^_]*)_([^\w]|$)", "$1$2$3"),
        (r"~~([^~]+)~~", "$1"),
        (r"\$\$", ""),
        (r"\$([^$]+)\$", "$1"),
        (r"\|", " "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid regex"), replacement))
    .collect()
});

/// Strip all markup from `text`, leaving one line of bare prose per
/// non-empty source line.
pub fn strip_markup(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in text.lines() {
        if let Some(stripped) = strip_line(line) {
            lines.push(stripped);
        }
    }

    lines.join("\n")
}

/// Count words after stripping markup. Tokens made only of punctuation are ignored.
pub fn count_words(text: &str) -> usize {
    strip_markup(text)
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

fn strip_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || MARKER_LINE_RE.is_match(trimmed)
        || DIRECTIVE_OPTION_RE.is_match(trimmed)
        || LABEL_LINE_RE.is_match(trimmed)
        || TABLE_SEPARATOR_RE.is_match(trimmed)
        || THEMATIC_BREAK_RE.is_match(trimmed)
    {
        return None;
    }

    let mut current = QUOTE_MARKER_RE.replace(trimmed, "").into_owned();
    if HEADING_MARKER_RE.is_match(&current) {
        current = HEADING_MARKER_RE.replace(&current, "").into_owned();
        current = CLOSING_HASHES_RE.replace(&current, "").into_owned();
    }
    current = LIST_MARKER_RE.replace(&current, "").into_owned();

    for (re, replacement) in INLINE_RULES.iter() {
        current = re.replace_all(&current, *replacement).into_owned();
    }

    let collapsed = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directive_and_bold() {
        assert_eq!(strip_markup(":::{note}\nHello **world**\n:::"), "Hello world");
    }

    #[test]
    fn strips_code_fences_but_keeps_code() {
        assert_eq!(strip_markup("```python\nx = 1\n```"), "x = 1");
    }

    #[test]
    fn strips_heading_quote_and_list_markers() {
        let input = "## Setup ##\n> quoted text\n- item one\n3. item three\n- [x] done";
        assert_eq!(
            strip_markup(input),
            "Setup\nquoted text\nitem one\nitem three\ndone"
        );
    }

    #[test]
    fn strips_inline_markup() {
        let input = "See [the docs](https://x.dev) and ![logo](a.png), run `cargo`, *really* _now_.";
        assert_eq!(
            strip_markup(input),
            "See the docs and logo, run cargo, really now."
        );
    }

    #[test]
    fn keeps_snake_case_identifiers() {
        assert_eq!(strip_markup("call my_func_name here"), "call my_func_name here");
    }

    #[test]
    fn strips_roles_math_and_labels() {
        let input = "(intro-label)=\nUse {ref}`intro` with $x^2$.\n$$\nE = mc^2\n$$";
        assert_eq!(strip_markup(input), "Use intro with x^2.\nE = mc^2");
    }

    #[test]
    fn strips_directive_options_and_tables() {
        let input = "```{figure} img.png\n:width: 80%\nCaption text\n```\n| a | b |\n|---|---|\n| 1 | 2 |";
        assert_eq!(strip_markup(input), "Caption text\na b\n1 2");
    }

    #[test]
    fn count_words_ignores_punctuation_tokens() {
        assert_eq!(count_words("# Title\n\n- one - two\n\n---\n"), 3);
        assert_eq!(count_words(""), 0);
    }
}
