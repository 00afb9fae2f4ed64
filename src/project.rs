//! A connected project: the task store, markdown generator and screenshot
//! directory bound to one `.moat/` directory.
//!
//! Every mutation goes through here so the JSON snapshot and the markdown
//! file are written before the call returns.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::markdown::{MarkdownGenerator, MARKDOWN_FILE};
use crate::screenshot::ScreenshotStore;
use crate::storage::{FsDir, StorageDir, MOAT_DIR, SCREENSHOTS_DIR};
use crate::task::{Change, NewTask, Task, TaskStore, TASKS_FILE};

#[derive(Debug)]
pub struct Project {
    root: Option<PathBuf>,
    config: Config,
    tasks_dir: Box<dyn StorageDir>,
    store: TaskStore,
    markdown: MarkdownGenerator,
    screenshots: ScreenshotStore,
    /// Set when the last markdown write failed
    markdown_stale: bool,
}

impl Project {
    /// Connect to `<root>/.moat/`, creating it and its screenshots
    /// directory when missing, and make sure both output files exist.
    pub fn connect(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = root.as_ref();
        let dir = FsDir::create(root.join(MOAT_DIR))?;
        let mut project = Self::with_storage(dir, config)?;
        project.root = Some(root.to_path_buf());
        project.ensure_files()?;
        info!(root = %root.display(), tasks = project.store.len(), "project connected");
        Ok(project)
    }

    /// Open a project that was connected before. Reads `.moat.toml` from
    /// the root when present.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let moat_dir = root.join(MOAT_DIR);
        if !moat_dir.is_dir() {
            return Err(Error::NotConnected(format!(
                "no {MOAT_DIR} directory in {}",
                root.display()
            )));
        }
        let config = Config::load_from_root(root)?;
        let mut project = Self::with_storage(FsDir::open(moat_dir)?, config)?;
        project.root = Some(root.to_path_buf());
        Ok(project)
    }

    /// Build a project over any storage directory and load its tasks.
    pub fn with_storage<D>(dir: D, config: Config) -> Result<Self>
    where
        D: StorageDir + Clone + 'static,
    {
        config.validate()?;
        let screenshots = ScreenshotStore::new(dir.dir(SCREENSHOTS_DIR)?);

        let mut store = TaskStore::new(config.tasks.clone());
        store.initialize(Box::new(dir.clone()));
        let loaded = store.load_tasks_from_file()?;

        let mut markdown = MarkdownGenerator::new(config.markdown.clone());
        markdown.initialize(Box::new(dir.clone()));

        debug!(storage = %dir.describe(), loaded, "project storage bound");
        Ok(Self {
            root: None,
            config,
            tasks_dir: Box::new(dir),
            store,
            markdown,
            screenshots,
            markdown_stale: false,
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn tasks_dir(&self) -> &dyn StorageDir {
        self.tasks_dir.as_ref()
    }

    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }

    pub fn add_task(&mut self, input: NewTask) -> Result<Change<Task>> {
        let change = self.store.add_task(input)?;
        self.persist_if(change.is_changed())?;
        Ok(change)
    }

    pub fn update_task_status(&mut self, id: &str, status: &str) -> Result<Change<Option<Task>>> {
        let change = self.store.update_task_status(id, status)?;
        self.persist_if(change.is_changed())?;
        Ok(change)
    }

    /// Remove a task along with its screenshot file.
    pub fn remove_task(&mut self, id: &str) -> Result<Change<bool>> {
        let screenshot = self
            .store
            .task_by_id(id)
            .and_then(|task| task.screenshot_path.clone());
        let change = self.store.remove_task(id);
        self.persist_if(change.is_changed())?;

        if let Some(path) = screenshot {
            if let Err(err) = self.screenshots.remove(&path) {
                warn!(id, path = %path, error = %err, "failed to delete screenshot of removed task");
            }
        }
        Ok(change)
    }

    /// Store `png` as the screenshot of task `id`. Unknown ids store
    /// nothing and yield `None`.
    pub fn attach_screenshot(&mut self, id: &str, png: &[u8]) -> Result<Change<Option<Task>>> {
        if self.store.task_by_id(id).is_none() {
            return Ok(Change::unchanged(None));
        }
        let path = self.screenshots.save(id, png)?;
        let change = self.store.set_screenshot_path(id, Some(path));
        self.persist_if(change.is_changed())?;
        Ok(change)
    }

    /// Delete every screenshot file and clear the references on tasks.
    /// Returns the number of files deleted.
    pub fn clear_screenshots(&mut self) -> Result<usize> {
        let removed = self.screenshots.clear()?;
        let change = self.store.clear_screenshot_paths();
        self.persist_if(change.is_changed())?;
        Ok(removed)
    }

    /// Regenerate the markdown file from the current tasks.
    pub fn rebuild(&mut self) -> Result<String> {
        match self.markdown.rebuild_markdown_file(self.store.tasks()) {
            Ok(content) => {
                self.markdown_stale = false;
                Ok(content)
            }
            Err(err) => {
                self.markdown_stale = true;
                Err(err)
            }
        }
    }

    /// True when `moat-tasks.md` may not reflect the current tasks
    pub fn is_markdown_stale(&self) -> bool {
        self.markdown_stale
    }

    /// Write out whatever an earlier failure left behind: unsaved tasks or
    /// a markdown file that missed a rebuild. Returns whether anything was
    /// written.
    pub fn sync(&mut self) -> Result<bool> {
        if self.store.is_dirty() {
            self.persist()?;
            return Ok(true);
        }
        if self.markdown_stale {
            self.rebuild()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn persist_if(&mut self, changed: bool) -> Result<()> {
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save_tasks_to_file()?;
        self.rebuild()?;
        Ok(())
    }

    fn ensure_files(&mut self) -> Result<()> {
        self.tasks_dir.file(TASKS_FILE)?;
        if self.tasks_dir.read(MARKDOWN_FILE)?.is_none() {
            self.rebuild()?;
        }
        Ok(())
    }
}
