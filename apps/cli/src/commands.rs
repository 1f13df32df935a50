//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::{info, warn};

use mystify_core::{
    FormatOutcome, TransformationHint, VerifyMode, format_and_verify, verify_preservation_with,
};
use mystify_markdown::{DetectionOptions, detect_admonition_candidates, detect_patterns, parse};
use mystify_shared::{
    AppConfig, ExternalSuggestion, MystifyError, TransformationConfig, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mystify: turn loose prose into MyST without losing a word.
#[derive(Parser)]
#[command(
    name = "mystify",
    version,
    about = "Annotate Markdown with MyST admonitions and code fences, then verify nothing was lost.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Format a document and verify the result.
    Format {
        /// Input file, or `-` for stdin.
        input: PathBuf,

        /// Write formatted output here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Features to enable (comma-separated, e.g. `admonitions,code-blocks`).
        #[arg(short, long)]
        features: Option<String>,

        /// Admonition confidence threshold (0-1).
        #[arg(short, long)]
        threshold: Option<f64>,

        /// JSON file of external suggestions (`[{"paragraphId": "block-2", "type": "tip", ...}]`).
        #[arg(long)]
        suggestions: Option<PathBuf>,

        /// Exit with an error if verification fails.
        #[arg(long)]
        strict: bool,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Verify that a formatted file preserves an original.
    Verify {
        /// Original file.
        original: PathBuf,

        /// Formatted file.
        formatted: PathBuf,

        /// Print the verdict as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the block structure of a document.
    Parse {
        /// Input file, or `-` for stdin.
        input: PathBuf,

        /// Print blocks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show detected patterns and admonition candidates without transforming.
    Detect {
        /// Input file, or `-` for stdin.
        input: PathBuf,

        /// Admonition confidence threshold (0-1).
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print detections as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mystify=warn",
        1 => "mystify=info",
        2 => "mystify=debug",
        _ => "mystify=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Format {
            input,
            out,
            features,
            threshold,
            suggestions,
            strict,
            json,
        } => cmd_format(FormatArgs {
            input,
            out,
            features,
            threshold,
            suggestions,
            strict,
            json,
        }),
        Command::Verify {
            original,
            formatted,
            json,
        } => cmd_verify(&original, &formatted, json),
        Command::Parse { input, json } => cmd_parse(&input, json),
        Command::Detect {
            input,
            threshold,
            json,
        } => cmd_detect(&input, threshold, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// format
// ---------------------------------------------------------------------------

struct FormatArgs {
    input: PathBuf,
    out: Option<PathBuf>,
    features: Option<String>,
    threshold: Option<f64>,
    suggestions: Option<PathBuf>,
    strict: bool,
    json: bool,
}

fn cmd_format(args: FormatArgs) -> Result<()> {
    let app = load_config()?;
    let mut config = TransformationConfig::from(&app);

    if let Some(features) = &args.features {
        config.selected_features = features
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
    }
    if let Some(threshold) = args.threshold {
        config.admonition_confidence_threshold = threshold;
    }
    if let Some(path) = &args.suggestions {
        config.external_suggestions = read_suggestions(path)?;
        info!(count = config.external_suggestions.len(), "loaded external suggestions");
    }

    let mode = if args.strict {
        VerifyMode::Strict
    } else {
        VerifyMode::Lenient
    };

    let raw = read_input(&args.input)?;
    let outcome = format_and_verify(&raw, &config, &app.verification, mode)?;

    if outcome.transformation.truncated_at_eof {
        warn!(input = %args.input.display(), "input ends inside an unclosed fence or directive");
        eprintln!("warning: input ends inside an unclosed fence, directive, or math block");
    }

    match &args.out {
        Some(path) => {
            std::fs::write(path, &outcome.transformation.formatted_content)
                .map_err(|e| MystifyError::io(path, e))?;
        }
        None if !args.json => print!("{}", outcome.transformation.formatted_content),
        None => {}
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_format_summary(&outcome, args.out.as_deref());
    }

    Ok(())
}

fn print_format_summary(outcome: &FormatOutcome, out: Option<&Path>) {
    let t = &outcome.transformation;
    let v = &outcome.verification;

    eprintln!();
    for applied in &t.applied_transformations {
        eprintln!("  {:<10} {}", applied.block_id, applied.description);
    }
    for warning in &t.warnings {
        eprintln!("  warning: {warning}");
    }
    eprintln!(
        "  Applied: {}  Hints: {}  Words: {} -> {}",
        t.applied_transformations.len(),
        t.suggestions.len(),
        t.original_word_count,
        t.formatted_word_count
    );
    eprintln!(
        "  Preserved: {} ({:.1}% words, {:.1}% sentences)",
        if v.is_preserved { "yes" } else { "NO" },
        v.preservation_percentage,
        v.sentence_preservation_rate
    );
    if let Some(path) = out {
        eprintln!("  Output: {}", path.display());
    }
}

fn read_suggestions(path: &Path) -> Result<Vec<ExternalSuggestion>> {
    let text = std::fs::read_to_string(path).map_err(|e| MystifyError::io(path, e))?;
    let suggestions: Vec<ExternalSuggestion> =
        serde_json::from_str(&text).map_err(MystifyError::from)?;
    Ok(suggestions)
}

// ---------------------------------------------------------------------------
// verify / parse / detect
// ---------------------------------------------------------------------------

fn cmd_verify(original: &Path, formatted: &Path, json: bool) -> Result<()> {
    let app = load_config()?;
    let original_text = read_input(original)?;
    let formatted_text = read_input(formatted)?;

    let verdict = verify_preservation_with(&original_text, &formatted_text, &app.verification);

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!(
            "Preserved: {} ({:.1}% words, {}/{} sentences)",
            if verdict.is_preserved { "yes" } else { "NO" },
            verdict.preservation_percentage,
            verdict.original_sentence_count - verdict.missing_sentence_count,
            verdict.original_sentence_count
        );
        for issue in &verdict.issues {
            let severity = format!("{:?}", issue.severity).to_lowercase();
            match &issue.excerpt {
                Some(excerpt) => println!("  [{severity}] {}: \"{excerpt}\"", issue.description),
                None => println!("  [{severity}] {}", issue.description),
            }
        }
    }

    if !verdict.is_preserved {
        return Err(eyre!("verification failed"));
    }
    Ok(())
}

fn cmd_parse(input: &Path, json: bool) -> Result<()> {
    let raw = read_input(input)?;
    let parsed = parse(&raw);

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed.blocks)?);
        return Ok(());
    }

    for block in &parsed.blocks {
        let first_line = block.content.lines().next().unwrap_or_default();
        println!(
            "{:<10} {:<10} L{}-{}  {}",
            block.id.to_string(),
            block.block_type.as_str(),
            block.start_line,
            block.end_line,
            first_line
        );
    }
    println!(
        "\n{} blocks, {} lines, {} words{}",
        parsed.blocks.len(),
        parsed.total_lines,
        parsed.word_count,
        if parsed.truncated_at_eof {
            " (truncated at end of input)"
        } else {
            ""
        }
    );
    Ok(())
}

fn cmd_detect(input: &Path, threshold: Option<f64>, json: bool) -> Result<()> {
    let app = load_config()?;
    let raw = read_input(input)?;
    let parsed = parse(&raw);

    let opts = DetectionOptions {
        min_confidence: threshold.unwrap_or(app.defaults.admonition_confidence_threshold),
        max_suggestions: app.defaults.max_admonitions,
        ..DetectionOptions::default()
    };
    let hints: Vec<TransformationHint> = detect_patterns(&parsed)
        .into_iter()
        .map(TransformationHint::Pattern)
        .chain(
            detect_admonition_candidates(&parsed.blocks, &opts)
                .into_iter()
                .map(TransformationHint::Admonition),
        )
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&hints)?);
        return Ok(());
    }

    for hint in &hints {
        match hint {
            TransformationHint::Pattern(p) => println!(
                "{:<10} {:<10} {:.2}  {}",
                p.block_id.to_string(),
                format!("{:?}", p.pattern_type).to_lowercase(),
                p.confidence,
                p.suggestion.as_deref().unwrap_or_default()
            ),
            TransformationHint::Admonition(a) => println!(
                "{:<10} {:<10} {:.2}  {}",
                a.block_id.to_string(),
                a.admonition_type.as_str(),
                a.confidence,
                a.reason
            ),
        }
    }
    if hints.is_empty() {
        println!("No patterns detected.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read a file, or stdin when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| MystifyError::io("<stdin>", e))?;
        return Ok(buf);
    }
    Ok(std::fs::read_to_string(path).map_err(|e| MystifyError::io(path, e))?)
}
