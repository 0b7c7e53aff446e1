//! Run configuration
//!
//! Reads configuration from:
//! - `.turnstile.yaml` / `.turnstile.yml` / `turnstile.yaml` (project-level)
//! - `~/.turnstile.yaml` (user-level)
//!
//! Precedence: defaults < user < project < CLI flags.

use crate::context::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Github,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "github" => Ok(OutputFormat::Github),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,

    /// Verbose output
    pub verbose: bool,
}

/// Diff selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Base ref to diff against
    pub base: String,

    /// Head ref; omitted means the working tree
    pub head: Option<String>,

    /// File set mode
    pub mode: Mode,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            base: "HEAD".to_string(),
            head: None,
            mode: Mode::Diff,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule documents or directories of rule documents
    pub rules: Vec<PathBuf>,

    /// Diff selection
    pub diff: DiffConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Degrade gracefully when an external tool is missing
    pub tolerate_missing_tools: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [".turnstile.yaml", ".turnstile.yml", "turnstile.yaml"];

        let mut config = Self::default();

        // user-level config first, so project settings win on merge
        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    config.merge(Self::load(&path)?);
                    break;
                }
            }
        }

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                config.merge(Self::load(&path)?);
                break;
            }
        }

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if !other.rules.is_empty() {
            self.rules = other.rules;
        }
        if other.diff.base != "HEAD" {
            self.diff.base = other.diff.base;
        }
        if other.diff.head.is_some() {
            self.diff.head = other.diff.head;
        }
        if other.diff.mode != Mode::Diff {
            self.diff.mode = other.diff.mode;
        }
        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.tolerate_missing_tools {
            self.tolerate_missing_tools = true;
        }
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        rules: Vec<PathBuf>,
        base: Option<String>,
        head: Option<String>,
        mode: Option<Mode>,
        format: Option<OutputFormat>,
        verbose: bool,
        tolerate_missing_tools: bool,
    ) {
        if !rules.is_empty() {
            self.rules = rules;
        }
        if let Some(base) = base {
            self.diff.base = base;
        }
        if let Some(head) = head {
            self.diff.head = Some(head);
        }
        if let Some(mode) = mode {
            self.diff.mode = mode;
        }
        if let Some(format) = format {
            self.output.format = format;
        }
        if verbose {
            self.output.verbose = true;
        }
        if tolerate_missing_tools {
            self.tolerate_missing_tools = true;
        }
    }
}
