//! Turnstile CLI - change-set gate
//!
//! Evaluates declaratively-configured rules against the files touched by a
//! diff and reports structured violations.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use turnstile::config::{ColorMode, Config, OutputFormat};
use turnstile::context::{EvaluationContext, Mode};
use turnstile::engine::Engine;
use turnstile::factory::{RuleFactory, RuleSource};
use turnstile::output::{GithubFormatter, JsonFormatter, OutputFormatter, TextFormatter};
use turnstile::repo::{GitRepository, Repository};

#[derive(Parser)]
#[command(
    name = "turnstile",
    version,
    about = "Change-set gate",
    long_about = "Validates proposed code changes against declaratively-configured rules. \
                  Run it as a CI gate or a pre-commit hook."
)]
struct Cli {
    /// Rule documents or directories of rule documents
    rules: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository root (defaults to the current directory)
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Base ref to diff against
    #[arg(long)]
    base: Option<String>,

    /// Head ref (defaults to the working tree)
    #[arg(long)]
    head: Option<String>,

    /// Evaluate every tracked file instead of the diff
    #[arg(long, conflicts_with = "staged")]
    all: bool,

    /// Evaluate files staged in the index
    #[arg(long)]
    staged: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Degrade gracefully when an external tool (e.g. ast-grep) is missing
    #[arg(long)]
    tolerate_missing_tools: bool,

    /// Exit with 0 even if violations are found
    #[arg(long)]
    exit_zero: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Github,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Github => OutputFormat::Github,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("turnstile: {:#}", error);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = match &cli.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::load_default().context("loading configuration")?,
    };

    let mode = if cli.all {
        Some(Mode::All)
    } else if cli.staged {
        Some(Mode::Staged)
    } else {
        None
    };
    config.merge_cli(
        cli.rules,
        cli.base,
        cli.head,
        mode,
        cli.format.map(OutputFormat::from),
        cli.verbose,
        cli.tolerate_missing_tools,
    );

    if cli.no_color || config.output.color == ColorMode::Never {
        colored::control::set_override(false);
    } else if config.output.color == ColorMode::Always {
        colored::control::set_override(true);
    }

    if config.rules.is_empty() {
        bail!("no rule documents given (pass files/directories or set 'rules' in .turnstile.yaml)");
    }

    let sources = load_sources(&config)?;
    if config.output.verbose {
        eprintln!("loaded {} rule source(s)", sources.len());
    }

    let root = match cli.repo {
        Some(root) => root,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let repo = GitRepository::new(root);

    let diff = match config.diff.mode {
        Mode::Diff => repo
            .get_diff(&config.diff.base, config.diff.head.as_deref())
            .context("computing diff")?,
        // staged/all snapshots list the mode's file set up front; selectors
        // still re-query the repository on every selection
        mode => {
            let empty = turnstile::context::DiffSnapshot::new(
                &config.diff.base,
                config.diff.head.as_deref(),
                vec![],
            );
            let files = repo.get_files(&empty, mode).context("listing files")?;
            turnstile::context::DiffSnapshot::new(
                &config.diff.base,
                config.diff.head.as_deref(),
                files,
            )
        }
    };

    let ctx = EvaluationContext::new(Arc::new(repo), diff, config.diff.mode)
        .with_tolerance(config.tolerate_missing_tools);

    let report = Engine::new().run(&sources, &ctx).context("evaluating rules")?;

    let formatter: Box<dyn OutputFormatter> = match config.output.format {
        OutputFormat::Text => {
            let mut text = TextFormatter::new();
            if cli.no_color || config.output.color == ColorMode::Never {
                text = text.without_color();
            }
            Box::new(text)
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
        OutputFormat::Github => Box::new(GithubFormatter::new()),
    };
    print!("{}", formatter.format(&report));

    if cli.exit_zero {
        return Ok(0);
    }
    Ok(report.exit_code())
}

fn load_sources(config: &Config) -> anyhow::Result<Vec<RuleSource>> {
    let mut factory = RuleFactory::new();
    let mut sources = Vec::new();

    for path in &config.rules {
        if path.is_dir() {
            let loaded = factory
                .load_dir(path)
                .with_context(|| format!("loading rules from {}", path.display()))?;
            sources.extend(loaded);
        } else {
            let source = factory
                .load_file(path)
                .with_context(|| format!("loading rule {}", path.display()))?;
            sources.push(source);
        }
    }

    if sources.is_empty() {
        bail!("no rule documents found under the configured paths");
    }
    Ok(sources)
}
