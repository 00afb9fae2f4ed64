//! Human-readable task list generated from the task snapshot.
//!
//! Output is a pure function of the task list and the markdown config: the
//! generation stamp comes from the newest task activity rather than the
//! wall clock, so rebuilding from the same tasks yields the same bytes.

use chrono::SecondsFormat;
use tracing::{debug, warn};

use crate::config::MarkdownConfig;
use crate::error::{Error, Result};
use crate::storage::StorageDir;
use crate::task::{self, Task, TaskStats, TaskStatus, TASKS_FILE};

/// Generated markdown file inside the storage directory
pub const MARKDOWN_FILE: &str = "moat-tasks.md";

const EMPTY_STATE: &str =
    "_No tasks yet. Open your page and press \"F\" to begin making annotations._";
const ELLIPSIS: &str = "...";

pub fn status_to_checkbox(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::ToDo => "[ ]",
        TaskStatus::Doing => "[~]",
        TaskStatus::Done => "[x]",
    }
}

/// Shorten `text` to at most `max_len` characters, ending in `...` when
/// anything was cut. Line breaks become spaces.
pub fn truncate_comment(text: &str, max_len: usize) -> String {
    let text = single_line(text);
    if text.chars().count() <= max_len {
        return text;
    }
    if max_len < ELLIPSIS.len() {
        return text.chars().take(max_len).collect();
    }
    let mut truncated: String = text.chars().take(max_len - ELLIPSIS.len()).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

pub fn generate_markdown_from_tasks(tasks: &[Task], config: &MarkdownConfig) -> String {
    let stats = TaskStats::from_tasks(tasks);
    let mut lines = vec![
        format!("# {}", single_line(config.title.trim())),
        String::new(),
        format!("**Total**: {}", stats.total),
        format!("**To Do**: {}", stats.to_do),
        format!("**Doing**: {}", stats.doing),
        format!("**Done**: {}", stats.done),
        String::new(),
    ];

    if tasks.is_empty() {
        lines.push(EMPTY_STATE.to_string());
    } else {
        let mut ordered = tasks.to_vec();
        task::sort_chronological(&mut ordered);
        for (index, task) in ordered.iter().enumerate() {
            lines.push(format!(
                "{}. {} {}",
                index + 1,
                status_to_checkbox(task.status),
                single_line(&task.title)
            ));
            let target = match &task.selector {
                Some(selector) => format!("`{selector}`"),
                None => "freeform".to_string(),
            };
            lines.push(format!(
                "   {} ({target})",
                truncate_comment(&task.comment, config.comment_max_len)
            ));
        }
    }

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(format!("_Generated: {}_", generation_stamp(tasks)));
    lines.push(format!("_Source: {TASKS_FILE}_"));

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

fn generation_stamp(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(Task::last_activity)
        .max()
        .map(|stamp| stamp.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "never".to_string())
}

/// Writes the generated list next to the task snapshot.
#[derive(Debug, Default)]
pub struct MarkdownGenerator {
    storage: Option<Box<dyn StorageDir>>,
    config: MarkdownConfig,
}

impl MarkdownGenerator {
    pub fn new(config: MarkdownConfig) -> Self {
        Self {
            storage: None,
            config,
        }
    }

    pub fn initialize(&mut self, storage: Box<dyn StorageDir>) {
        debug!(storage = %storage.describe(), "markdown generator bound");
        self.storage = Some(storage);
    }

    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }

    pub fn config(&self) -> &MarkdownConfig {
        &self.config
    }

    /// Replace [`MARKDOWN_FILE`] with `content`.
    pub fn write_markdown_to_file(&self, content: &str) -> Result<()> {
        let storage = self.storage.as_deref().ok_or_else(|| {
            Error::NotConnected("markdown generator has no storage directory".to_string())
        })?;
        if let Err(err) = storage.write(MARKDOWN_FILE, content.as_bytes()) {
            warn!(storage = %storage.describe(), error = %err, "failed to write {MARKDOWN_FILE}");
            return Err(err);
        }
        debug!(bytes = content.len(), "markdown written");
        Ok(())
    }

    pub fn rebuild_markdown_file(&self, tasks: &[Task]) -> Result<String> {
        let content = generate_markdown_from_tasks(tasks, &self.config);
        self.write_markdown_to_file(&content)?;
        Ok(content)
    }
}
