//! Configuration loading and management
//!
//! Handles parsing of the optional `.moat.toml` file at the project root.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file at the project root
pub const CONFIG_FILE: &str = ".moat.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Task store configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Markdown rendering configuration
    #[serde(default)]
    pub markdown: MarkdownConfig,
}

/// Task store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// How far apart (in page pixels) two freeform rectangles may be and
    /// still count as the same annotation
    #[serde(default = "default_dedup_tolerance_px")]
    pub dedup_tolerance_px: f64,
}

fn default_dedup_tolerance_px() -> f64 {
    10.0
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            dedup_tolerance_px: default_dedup_tolerance_px(),
        }
    }
}

/// Markdown rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Top-level heading of the generated file
    #[serde(default = "default_markdown_title")]
    pub title: String,

    /// Maximum characters of a comment shown under each task
    #[serde(default = "default_comment_max_len")]
    pub comment_max_len: usize,
}

fn default_markdown_title() -> String {
    "Moat Tasks".to_string()
}

fn default_comment_max_len() -> usize {
    60
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            title: default_markdown_title(),
            comment_max_len: default_comment_max_len(),
        }
    }
}

impl Config {
    /// Load configuration from a `.moat.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the project root, or return defaults when
    /// the file is absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.tasks.validate()?;
        self.markdown.validate()?;
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        let tolerance = self.dedup_tolerance_px;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tasks.dedup_tolerance_px must be a finite number >= 0 (got {tolerance})"
            )));
        }
        Ok(())
    }
}

impl MarkdownConfig {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "markdown.title cannot be empty".to_string(),
            ));
        }
        if self.comment_max_len < 3 {
            return Err(Error::InvalidConfig(
                "markdown.comment_max_len must be >= 3".to_string(),
            ));
        }
        Ok(())
    }
}
