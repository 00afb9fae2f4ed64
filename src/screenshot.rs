//! Screenshot assets stored under `.moat/screenshots/`.
//!
//! Tasks refer to their screenshot by a path relative to the storage
//! directory (`./screenshots/<task-id>.png`), which is what the markdown
//! and JSON files carry.

use tracing::debug;

use crate::error::Result;
use crate::storage::{StorageDir, SCREENSHOTS_DIR};

const SCREENSHOT_EXTENSION: &str = "png";

/// Path a task records for a screenshot file name
pub fn screenshot_path(file_name: &str) -> String {
    format!("./{SCREENSHOTS_DIR}/{file_name}")
}

#[derive(Debug)]
pub struct ScreenshotStore {
    dir: Box<dyn StorageDir>,
}

impl ScreenshotStore {
    /// Wrap the screenshots directory itself (not its parent)
    pub fn new(dir: Box<dyn StorageDir>) -> Self {
        Self { dir }
    }

    /// Store the PNG for `task_id`, replacing any earlier one, and return
    /// the path to record on the task.
    pub fn save(&self, task_id: &str, png: &[u8]) -> Result<String> {
        let file_name = format!("{task_id}.{SCREENSHOT_EXTENSION}");
        self.dir.write(&file_name, png)?;
        debug!(task_id, bytes = png.len(), "screenshot saved");
        Ok(screenshot_path(&file_name))
    }

    pub fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.dir.read(file_name(path))
    }

    /// Delete the screenshot at `path`. Returns false when it was already gone.
    pub fn remove(&self, path: &str) -> Result<bool> {
        self.dir.remove(file_name(path))
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.dir.files()?.len())
    }

    /// Delete every stored screenshot. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for name in self.dir.files()? {
            if self.dir.remove(&name)? {
                removed += 1;
            }
        }
        debug!(removed, "screenshots cleared");
        Ok(removed)
    }
}

/// Accepts `./screenshots/x.png`, `screenshots/x.png` or `x.png`.
fn file_name(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.strip_prefix(SCREENSHOTS_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}
