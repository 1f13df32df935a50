//! Programming-language detection for code blocks.
//!
//! Each profile is a list of regex signals. A profile's score is the
//! fraction of its signals found in the code; the best profile wins unless
//! it scores below [`MIN_LANGUAGE_SCORE`]. Earlier profiles win ties.

use std::sync::LazyLock;

use crate::rules::RuleTable;

/// Scores below this are treated as "unknown language".
pub const MIN_LANGUAGE_SCORE: f64 = 0.2;

type ProfileSpec = (&'static str, &'static [&'static str]);

const PROFILES: &[ProfileSpec] = &[
    (
        "python",
        &[
            r"(?m)^\s*def\s+\w+\s*\(.*\)\s*(->\s*[^:]+)?:\s*$",
            r"(?m)^\s*(from\s+[\w.]+\s+)?import\s+[\w.]+(\s+as\s+\w+)?\s*$",
            r"(?m)^\s*class\s+\w+(\([^)]*\))?:\s*$",
            r"(?m)^\s*(if|elif|else|for|while|with|try|except|finally)\b.*:\s*$",
            r"\bprint\(",
            r"\bself\.",
            r"\b(None|True|False)\b",
            r"(?m)^\s*return\b",
        ],
    ),
    (
        "javascript",
        &[
            r"\bfunction\s*\w*\s*\(",
            r"\b(const|let|var)\s+\w+\s*=",
            r"=>",
            r"\bconsole\.\w+\(",
            r"\b(require\(|module\.exports|export\s+(default|const|function))",
            r"===|!==",
            r"\b(undefined|null)\b",
            r"(?m);\s*$",
        ],
    ),
    (
        "typescript",
        &[
            r":\s*(string|number|boolean|any|void|unknown)\b",
            r"\binterface\s+\w+\s*\{",
            r"\btype\s+\w+\s*=",
            r"\b(const|let)\s+\w+\s*:\s*\w+",
            r"\bfunction\s+\w+\s*\(.*\)\s*:\s*\w+",
            r"\b(public|private|protected|readonly)\s+\w+\s*:",
            r#"\bimport\s+.*\bfrom\s+['"]"#,
            r"\bexport\s+(interface|type|enum)\b",
        ],
    ),
    (
        "rust",
        &[
            r"\bfn\s+\w+",
            r"\blet\s+(mut\s+)?\w+",
            r"\bimpl\b",
            r"\bpub\s+(fn|struct|enum|mod|trait)\b",
            r"\b\w+!\(",
            r"&mut\s|&self\b",
            r"\w::\w",
            r"\b(match|Some|Ok|Err)\b",
        ],
    ),
    (
        "go",
        &[
            r"\bfunc\s+(\(\w+\s+\*?\w+\)\s*)?\w+\(",
            r"(?m)^package\s+\w+",
            r":=",
            r"\bfmt\.\w+\(",
            r"(?m)^import\s+\(",
            r"\bgo\s+func\b",
            r"\bchan\b",
            r"\bdefer\b",
        ],
    ),
    (
        "java",
        &[
            r"\bpublic\s+(static\s+)?(class|void|int|String)\b",
            r"System\.out\.print",
            r"\bprivate\s+\w+\s+\w+\s*[;=]",
            r"@Override",
            r"\bnew\s+[A-Z]\w*\(",
            r"\bimport\s+java\.",
            r"(?m);\s*$",
            r"\bString\[\]",
        ],
    ),
    (
        "c",
        &[
            r"#include\s*<\w+\.h>",
            r"\bint\s+main\s*\(",
            r"\bprintf\(",
            r"\b(malloc|free|sizeof)\(",
            r"->\w+",
            r"\b(struct|typedef)\s+\w+",
            r"(?m);\s*$",
            r"\b(unsigned|char|int|long)\s+\*?\w+\s*[;=\[]",
        ],
    ),
    (
        "cpp",
        &[
            r"#include\s*<(iostream|vector|string|map|memory)>",
            r"\bstd::",
            r"\bcout\s*<<|\bcin\s*>>",
            r"\bnamespace\s+\w+",
            r"\btemplate\s*<",
            r"\bclass\s+\w+\s*(:\s*public\b)?",
            r"\w::\w+\(",
            r"\bnew\s+\w+",
        ],
    ),
    (
        "csharp",
        &[
            r"\busing\s+System",
            r"\bnamespace\s+[\w.]+",
            r"\bpublic\s+(class|static|void|async)\b",
            r"Console\.Write(Line)?\(",
            r"\bvar\s+\w+\s*=",
            r"\{\s*get;\s*(set;)?\s*\}",
            r"\bstring\[\]",
            r"\basync\s+Task\b",
        ],
    ),
    (
        "ruby",
        &[
            r"(?m)^\s*def\s+\w+",
            r"(?m)^\s*end\s*$",
            r"\bputs\b",
            r"\battr_(accessor|reader|writer)\b",
            r"\.each\s+do\b|\bdo\s*\|",
            r#"(?m)^\s*require\s+['"]"#,
            r"@\w+\s*=",
            r"(?m)^\s*module\s+[A-Z]",
        ],
    ),
    (
        "php",
        &[
            r"<\?php",
            r"\$\w+\s*=",
            r"\becho\s",
            r"\bfunction\s+\w+\s*\(\$",
            r"->\w+\(",
            r"\barray\(",
            r"\bnamespace\s+[\w\\]+;",
            r"(?m)^\s*use\s+[\w\\]+;",
        ],
    ),
    (
        "kotlin",
        &[
            r"\bfun\s+\w+\s*\(",
            r"\bval\s+\w+",
            r"\bvar\s+\w+\s*:",
            r"\bdata\s+class\b",
            r"\bprintln\(",
            r"\?\.|\?:",
            r"\bwhen\s*\(",
            r"\bcompanion\s+object\b",
        ],
    ),
    (
        "bash",
        &[
            r"(?m)^#!/(usr/)?bin/(env\s+)?(ba)?sh",
            r"(?m)^\s*(sudo|apt(-get)?|brew|npm|pip|cargo|git|cd|ls|mkdir|echo|export|curl|wget)\s",
            r"\$\{?\w+\}?",
            r"(?m)^\s*if\s+\[",
            r"\bfi\b",
            r"\|\s*(grep|awk|sed|xargs)\b",
            r"&&",
            r"(?m)^\s*\w+=\S*\s*$",
        ],
    ),
    (
        "sql",
        &[
            r"(?is)\bSELECT\b.*\bFROM\b",
            r"(?i)\b(INSERT\s+INTO|UPDATE\s+\w+\s+SET|DELETE\s+FROM)\b",
            r"(?i)\bCREATE\s+(TABLE|INDEX|VIEW)\b",
            r"(?i)\bWHERE\b",
            r"(?i)\b(JOIN|GROUP\s+BY|ORDER\s+BY)\b",
            r"(?m);\s*$",
        ],
    ),
    (
        "html",
        &[
            r"(?i)<!DOCTYPE\s+html>",
            r"<(html|head|body|div|span|p|a|ul|li|section)\b[^>]*>",
            r"</\w+>",
            r#"\b(class|id|href|src)="[^"]*""#,
            r"<!--.*-->",
        ],
    ),
    (
        "css",
        &[
            r"(?m)^\s*[.#]?[\w-]+(\s*[,>+~]\s*[.#]?[\w-]+)*\s*\{\s*$",
            r"(?m)^\s*[\w-]+\s*:\s*[^;]+;\s*$",
            r"@media\b|@import\b|@keyframes\b",
            r"\b\d+(px|em|rem|vh|vw)\b",
            r"#[0-9a-fA-F]{3,6}\b",
        ],
    ),
    (
        "json",
        &[
            r"\A\s*[\{\[]",
            r#""[^"]+"\s*:"#,
            r":\s*(true|false|null|-?\d)",
            r"(?m),\s*$",
            r#"(?m)^\s*"[^"]*",?\s*$"#,
        ],
    ),
    (
        "yaml",
        &[
            r"(?m)^\s*[\w-]+:\s*$",
            r"(?m)^\s*[\w-]+:\s+\S",
            r"(?m)^\s*-\s+[\w-]+:\s",
            r"(?m)^---\s*$",
            r"(?m)^\s*#\s",
        ],
    ),
];

/// Outcome of [`detect_language`].
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    pub language: String,
    /// Fraction of the winning profile's signals that matched.
    pub confidence: f64,
}

/// A named list of signals for one language.
#[derive(Debug)]
pub struct LanguageProfile {
    pub name: &'static str,
    pub signals: RuleTable,
}

static LANGUAGE_PROFILES: LazyLock<Vec<LanguageProfile>> = LazyLock::new(|| {
    PROFILES
        .iter()
        .map(|&(name, signals)| LanguageProfile {
            name,
            signals: RuleTable::uniform(signals),
        })
        .collect()
});

/// All compiled language profiles in priority order.
pub fn profiles() -> &'static [LanguageProfile] {
    &LANGUAGE_PROFILES
}

/// Guess the language of a code snippet.
///
/// Returns `None` when no profile reaches [`MIN_LANGUAGE_SCORE`].
pub fn detect_language(code: &str) -> Option<LanguageGuess> {
    if code.trim().is_empty() {
        return None;
    }

    let mut best: Option<(&LanguageProfile, f64)> = None;
    for profile in profiles() {
        let score = profile.signals.matched_fraction(code);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((profile, score));
        }
    }

    let (profile, score) = best?;
    if score < MIN_LANGUAGE_SCORE {
        return None;
    }
    Some(LanguageGuess {
        language: profile.name.to_string(),
        confidence: score,
    })
}
