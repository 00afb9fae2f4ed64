//! Annotation tasks and the store that owns them.
//!
//! The store keeps the authoritative list in memory and snapshots it as a
//! JSON array to `moat-tasks-detail.json` in the bound storage directory.
//! Every mutating operation returns a [`Change`] so callers have to decide
//! what to do about persistence; `Project` in `crate::project` saves and
//! rebuilds the markdown for them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TasksConfig;
use crate::error::{Error, Result};
use crate::storage::StorageDir;

/// JSON snapshot of the task list inside the storage directory
pub const TASKS_FILE: &str = "moat-tasks-detail.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "to do")]
    ToDo,
    #[serde(rename = "doing")]
    Doing,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::Doing, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "to do",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}

/// Rectangle in page coordinates.
///
/// The capture side has written both `w`/`h` and `width`/`height`; both
/// are accepted, `w`/`h` is what gets written back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    #[serde(alias = "width")]
    pub w: f64,
    #[serde(alias = "height")]
    pub h: f64,
}

impl BoundingRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// True when the origins or the centers are within `tolerance` pixels
    /// of each other on both axes.
    pub fn is_near(&self, other: &BoundingRect, tolerance: f64) -> bool {
        let close = |a: (f64, f64), b: (f64, f64)| {
            (a.0 - b.0).abs() <= tolerance && (a.1 - b.1).abs() <= tolerance
        };
        close((self.x, self.y), (other.x, other.y)) || close(self.center(), other.center())
    }
}

impl FromStr for BoundingRect {
    type Err = Error;

    /// Parses `x,y,w,h`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::InvalidArgument(format!(
                "rectangle must be x,y,w,h: '{s}'"
            )));
        }
        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            let value: f64 = part.parse().map_err(|_| {
                Error::InvalidArgument(format!("invalid rectangle coordinate '{part}'"))
            })?;
            if !value.is_finite() {
                return Err(Error::InvalidArgument(format!(
                    "invalid rectangle coordinate '{part}'"
                )));
            }
            *slot = value;
        }
        Ok(BoundingRect::new(values[0], values[1], values[2], values[3]))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub comment: String,
    /// `None` for freeform rectangle annotations
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_rect: Option<BoundingRect>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
}

impl Task {
    pub fn is_freeform(&self) -> bool {
        self.selector.is_none()
    }

    /// Latest moment this task was touched
    pub fn last_activity(&self) -> DateTime<Utc> {
        match self.last_modified {
            Some(modified) if modified > self.timestamp => modified,
            _ => self.timestamp,
        }
    }

    fn duplicates(&self, candidate: &ValidTask, tolerance: f64) -> bool {
        if self.status.is_done() || self.comment != candidate.comment {
            return false;
        }
        match (&self.selector, &candidate.selector) {
            (Some(existing), Some(incoming)) => existing == incoming,
            (None, None) => match (&self.bounding_rect, &candidate.bounding_rect) {
                (Some(existing), Some(incoming)) => existing.is_near(incoming, tolerance),
                _ => true,
            },
            _ => false,
        }
    }
}

/// Input for [`TaskStore::add_task`].
///
/// `title` and `comment` are optional here so that a capture payload with
/// a missing field can be represented and rejected with a proper error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub bounding_rect: Option<BoundingRect>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            comment: Some(comment.into()),
            ..Self::default()
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn bounding_rect(mut self, rect: BoundingRect) -> Self {
        self.bounding_rect = Some(rect);
        self
    }

    pub fn screenshot_path(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    fn validate(self) -> Result<ValidTask> {
        let title = required(self.title, "title")?;
        let comment = required(self.comment, "comment")?;
        let selector = self
            .selector
            .map(|selector| selector.trim().to_string())
            .filter(|selector| !selector.is_empty());
        Ok(ValidTask {
            title,
            comment,
            selector,
            bounding_rect: self.bounding_rect,
            screenshot_path: self.screenshot_path,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::MissingField(field)),
    }
}

struct ValidTask {
    title: String,
    comment: String,
    selector: Option<String>,
    bounding_rect: Option<BoundingRect>,
    screenshot_path: Option<String>,
}

/// Counts by status. Serialized with the status names as keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    #[serde(rename = "to do")]
    pub to_do: usize,
    pub doing: usize,
    pub done: usize,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = TaskStats::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::ToDo => stats.to_do += 1,
                TaskStatus::Doing => stats.doing += 1,
                TaskStatus::Done => stats.done += 1,
            }
        }
        stats
    }
}

/// Result of a store operation plus whether the collection changed.
///
/// A changed store is only durable once it has been saved and the
/// markdown rebuilt.
#[must_use = "a changed store must be saved and its markdown rebuilt"]
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    value: T,
    changed: bool,
}

impl<T> Change<T> {
    pub fn changed(value: T) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: false,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Change<U> {
        Change {
            value: f(self.value),
            changed: self.changed,
        }
    }
}

/// Millisecond clock that never hands out the same stamp twice.
#[derive(Debug, Clone, Default)]
struct StampClock {
    last: Option<DateTime<Utc>>,
}

impl StampClock {
    fn next(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let stamp = match self.last {
            Some(last) if last >= now => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }

    fn observe(&mut self, stamp: DateTime<Utc>) {
        if self.last.map_or(true, |last| stamp > last) {
            self.last = Some(stamp);
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    storage: Option<Box<dyn StorageDir>>,
    config: TasksConfig,
    clock: StampClock,
    dirty: bool,
}

impl TaskStore {
    pub fn new(config: TasksConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Bind the store to the directory it persists into. No I/O happens
    /// until a save or load.
    pub fn initialize(&mut self, storage: Box<dyn StorageDir>) {
        debug!(storage = %storage.describe(), "task store bound");
        self.storage = Some(storage);
    }

    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }

    pub fn config(&self) -> &TasksConfig {
        &self.config
    }

    /// True when the in-memory list has changes no successful save has
    /// written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn add_task(&mut self, input: NewTask) -> Result<Change<Task>> {
        let candidate = input.validate()?;
        let tolerance = self.config.dedup_tolerance_px;

        if let Some(existing) = self
            .tasks
            .iter()
            .find(|task| task.duplicates(&candidate, tolerance))
        {
            debug!(id = %existing.id, "annotation matches a live task, keeping existing");
            return Ok(Change::unchanged(existing.clone()));
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: candidate.title,
            comment: candidate.comment,
            selector: candidate.selector,
            bounding_rect: candidate.bounding_rect,
            status: TaskStatus::default(),
            timestamp: self.clock.next(),
            last_modified: None,
            screenshot_path: candidate.screenshot_path,
        };
        debug!(id = %task.id, freeform = task.is_freeform(), "task added");
        self.tasks.push(task.clone());
        self.dirty = true;
        Ok(Change::changed(task))
    }

    /// Parse `status` and apply it. Unknown ids yield `None`; an invalid
    /// status is an error and leaves the task untouched.
    pub fn update_task_status(&mut self, id: &str, status: &str) -> Result<Change<Option<Task>>> {
        let status: TaskStatus = status.parse()?;
        Ok(self.set_task_status(id, status))
    }

    pub fn set_task_status(&mut self, id: &str, status: TaskStatus) -> Change<Option<Task>> {
        let Some(index) = self.position(id) else {
            return Change::unchanged(None);
        };
        let stamp = self.clock.next();
        let task = &mut self.tasks[index];
        task.status = status;
        task.last_modified = Some(stamp);
        debug!(id = %task.id, status = %status, "task status updated");
        self.dirty = true;
        Change::changed(Some(task.clone()))
    }

    /// [`update_task_status`](Self::update_task_status) followed by a save
    /// when a task changed.
    pub fn update_task_status_and_save(&mut self, id: &str, status: &str) -> Result<Change<Option<Task>>> {
        let change = self.update_task_status(id, status)?;
        if change.is_changed() {
            self.save_tasks_to_file()?;
        }
        Ok(change)
    }

    pub fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Newest first
    pub fn all_tasks(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        tasks
    }

    /// Oldest first
    pub fn all_tasks_chronological(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        sort_chronological(&mut tasks);
        tasks
    }

    pub fn task_stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }

    pub fn remove_task(&mut self, id: &str) -> Change<bool> {
        match self.position(id) {
            Some(index) => {
                let task = self.tasks.remove(index);
                debug!(id = %task.id, "task removed");
                self.dirty = true;
                Change::changed(true)
            }
            None => Change::unchanged(false),
        }
    }

    pub fn set_screenshot_path(&mut self, id: &str, path: Option<String>) -> Change<Option<Task>> {
        let Some(index) = self.position(id) else {
            return Change::unchanged(None);
        };
        let task = &mut self.tasks[index];
        if task.screenshot_path == path {
            return Change::unchanged(Some(task.clone()));
        }
        task.screenshot_path = path;
        self.dirty = true;
        Change::changed(Some(task.clone()))
    }

    /// Drop every screenshot reference. Returns how many tasks had one.
    pub fn clear_screenshot_paths(&mut self) -> Change<usize> {
        let mut cleared = 0;
        for task in &mut self.tasks {
            if task.screenshot_path.take().is_some() {
                cleared += 1;
            }
        }
        if cleared == 0 {
            return Change::unchanged(0);
        }
        self.dirty = true;
        Change::changed(cleared)
    }

    /// Write the whole collection to [`TASKS_FILE`], replacing what was
    /// there. On failure the in-memory list is kept and stays dirty.
    pub fn save_tasks_to_file(&mut self) -> Result<()> {
        let storage = self.storage()?;
        let json = serde_json::to_vec_pretty(&self.tasks)?;
        if let Err(err) = storage.write(TASKS_FILE, &json) {
            warn!(
                storage = %storage.describe(),
                error = %err,
                "failed to save tasks, keeping in-memory state"
            );
            return Err(err);
        }
        debug!(count = self.tasks.len(), storage = %storage.describe(), "tasks saved");
        self.dirty = false;
        Ok(())
    }

    /// Replace the in-memory list with the saved snapshot.
    ///
    /// A missing, empty or unparsable file loads as an empty list. In a
    /// readable array, records that do not decode are skipped one by one.
    /// Returns the number of tasks loaded.
    pub fn load_tasks_from_file(&mut self) -> Result<usize> {
        let storage = self.storage()?;
        let tasks = match storage.read(TASKS_FILE)? {
            None => Vec::new(),
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Some(bytes) => match serde_json::from_slice::<Vec<Value>>(&bytes) {
                Ok(records) => decode_records(records),
                Err(err) => {
                    warn!(
                        storage = %storage.describe(),
                        error = %err,
                        "{TASKS_FILE} is not a valid task list, starting empty"
                    );
                    Vec::new()
                }
            },
        };
        debug!(count = tasks.len(), "tasks loaded");

        self.clock = StampClock::default();
        for task in &tasks {
            self.clock.observe(task.last_activity());
        }
        self.tasks = tasks;
        self.dirty = false;
        Ok(self.tasks.len())
    }

    fn storage(&self) -> Result<&dyn StorageDir> {
        self.storage.as_deref().ok_or_else(|| {
            Error::NotConnected("task store has no storage directory".to_string())
        })
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }
}

fn decode_records(records: Vec<Value>) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<none>")
            .to_string();
        match serde_json::from_value::<Task>(with_timestamp_fallback(record)) {
            Ok(task) => tasks.push(task),
            Err(err) => warn!(index, id = %id, error = %err, "skipping unreadable task record"),
        }
    }
    tasks
}

/// Older records carry `createdAt` (epoch millis or RFC 3339) instead of
/// `timestamp`.
fn with_timestamp_fallback(mut record: Value) -> Value {
    let Some(object) = record.as_object_mut() else {
        return record;
    };
    if object.contains_key("timestamp") {
        return record;
    }
    let millis = match object.get("createdAt") {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64)),
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|stamp| stamp.timestamp_millis()),
        _ => None,
    };
    if let Some(millis) = millis {
        object.insert("timestamp".to_string(), Value::from(millis));
    }
    record
}

/// Sort oldest first, keeping input order among equal stamps.
pub fn sort_chronological(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsDir, MemoryDir};
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn button_task() -> NewTask {
        NewTask::new("T", "C").selector(".btn")
    }

    fn bound_store(dir: &MemoryDir) -> TaskStore {
        let mut store = TaskStore::default();
        store.initialize(Box::new(dir.clone()));
        store
    }

    #[test]
    fn add_task_assigns_defaults() {
        let mut store = TaskStore::default();
        let before = Utc::now() - Duration::milliseconds(1);
        let task = store
            .add_task(
                NewTask::new("Test Task", "This is a test comment")
                    .selector(".test-element")
                    .bounding_rect(BoundingRect::new(0.0, 0.0, 100.0, 50.0)),
            )
            .expect("add")
            .into_inner();

        assert_eq!(task.title, "Test Task");
        assert_eq!(task.comment, "This is a test comment");
        assert_eq!(task.status, TaskStatus::ToDo);
        assert!(task.last_modified.is_none());
        assert!(task.timestamp >= before);
        let parsed = Uuid::parse_str(&task.id).expect("uuid id");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn add_task_requires_title_and_comment() {
        let mut store = TaskStore::default();

        let missing_comment = NewTask {
            title: Some("Test".to_string()),
            ..NewTask::default()
        };
        let err = store.add_task(missing_comment).expect_err("no comment");
        assert!(matches!(err, Error::MissingField("comment")));

        let missing_title = NewTask {
            comment: Some("Test comment".to_string()),
            ..NewTask::default()
        };
        let err = store.add_task(missing_title).expect_err("no title");
        assert!(matches!(err, Error::MissingField("title")));

        let err = store.add_task(NewTask::new("  ", "c")).expect_err("blank title");
        assert!(matches!(err, Error::MissingField("title")));

        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn duplicate_lifecycle_scenario() {
        let mut store = TaskStore::default();

        let first = store.add_task(button_task()).expect("add");
        assert!(first.is_changed());
        let first = first.into_inner();
        assert_eq!(first.status, TaskStatus::ToDo);

        let again = store.add_task(button_task()).expect("add again");
        assert!(!again.is_changed());
        assert_eq!(again.value().id, first.id);
        assert_eq!(store.len(), 1);

        let _ = store.set_task_status(&first.id, TaskStatus::Done);

        let third = store.add_task(button_task()).expect("add third").into_inner();
        assert_ne!(third.id, first.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn doing_tasks_still_block_duplicates() {
        let mut store = TaskStore::default();
        let first = store.add_task(button_task()).expect("add").into_inner();
        let _ = store.set_task_status(&first.id, TaskStatus::Doing);

        let again = store.add_task(button_task()).expect("add").into_inner();
        assert_eq!(again.id, first.id);
        assert_eq!(again.status, TaskStatus::Doing);
    }

    #[test]
    fn different_comment_or_selector_is_not_a_duplicate() {
        let mut store = TaskStore::default();
        let _ = store.add_task(button_task()).expect("add");
        let _ = store
            .add_task(NewTask::new("T", "other comment").selector(".btn"))
            .expect("add");
        let _ = store
            .add_task(NewTask::new("T", "C").selector(".link"))
            .expect("add");
        let _ = store.add_task(NewTask::new("T", "C")).expect("freeform");
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn freeform_duplicates_use_rect_tolerance() {
        let mut store = TaskStore::default();
        let rect = BoundingRect::new(10.0, 10.0, 100.0, 100.0);
        let first = store
            .add_task(NewTask::new("Rectangle", "Same comment").bounding_rect(rect))
            .expect("add")
            .into_inner();
        assert!(first.selector.is_none());

        let same = store
            .add_task(NewTask::new("Rectangle", "Same comment").bounding_rect(rect))
            .expect("add")
            .into_inner();
        assert_eq!(same.id, first.id);

        let nudged = BoundingRect::new(18.0, 14.0, 100.0, 100.0);
        let near = store
            .add_task(NewTask::new("Rectangle", "Same comment").bounding_rect(nudged))
            .expect("add")
            .into_inner();
        assert_eq!(near.id, first.id);

        let elsewhere = BoundingRect::new(400.0, 300.0, 100.0, 100.0);
        let far = store
            .add_task(NewTask::new("Rectangle", "Same comment").bounding_rect(elsewhere))
            .expect("add")
            .into_inner();
        assert_ne!(far.id, first.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rect_centers_within_tolerance_match() {
        // origins 20px apart, but both rectangles share a center
        let outer = BoundingRect::new(0.0, 0.0, 100.0, 100.0);
        let inner = BoundingRect::new(20.0, 20.0, 60.0, 60.0);
        assert!(outer.is_near(&inner, 10.0));
        assert!(!outer.is_near(&BoundingRect::new(20.0, 20.0, 100.0, 100.0), 10.0));
    }

    #[test]
    fn tolerance_comes_from_config() {
        let mut store = TaskStore::new(TasksConfig {
            dedup_tolerance_px: 0.0,
        });
        let _ = store
            .add_task(NewTask::new("R", "C").bounding_rect(BoundingRect::new(0.0, 0.0, 5.0, 5.0)))
            .expect("add");
        let _ = store
            .add_task(NewTask::new("R", "C").bounding_rect(BoundingRect::new(1.0, 0.0, 5.0, 5.0)))
            .expect("add");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_status_sets_last_modified_monotonically() {
        let mut store = TaskStore::default();
        let task = store.add_task(button_task()).expect("add").into_inner();

        let doing = store
            .update_task_status(&task.id, "doing")
            .expect("doing")
            .into_inner()
            .expect("task exists");
        let done = store
            .update_task_status(&task.id, "done")
            .expect("done")
            .into_inner()
            .expect("task exists");

        assert_eq!(done.status, TaskStatus::Done);
        let first = doing.last_modified.expect("stamped");
        let second = done.last_modified.expect("stamped");
        assert!(first > task.timestamp);
        assert!(second > first);
        assert_eq!(store.task_by_id(&task.id), Some(&done));
    }

    #[test]
    fn invalid_status_is_rejected_without_mutation() {
        let mut store = TaskStore::default();
        let task = store.add_task(button_task()).expect("add").into_inner();

        for bad in ["invalid-status", "Done", "todo", ""] {
            let err = store.update_task_status(&task.id, bad).expect_err("invalid");
            assert!(matches!(err, Error::InvalidStatus(_)));
        }
        assert_eq!(store.task_by_id(&task.id), Some(&task));
    }

    #[test]
    fn unknown_ids_are_not_errors() {
        let mut store = TaskStore::default();
        let change = store
            .update_task_status("non-existent-id", "doing")
            .expect("not an error");
        assert!(!change.is_changed());
        assert!(change.into_inner().is_none());
        assert!(store.task_by_id("non-existent-id").is_none());
        assert!(!store.remove_task("non-existent-id").into_inner());
    }

    #[test]
    fn remove_task_is_idempotent() {
        let mut store = TaskStore::default();
        let keep = store
            .add_task(NewTask::new("Keep", "c").selector(".a"))
            .expect("add")
            .into_inner();
        let task = store.add_task(button_task()).expect("add").into_inner();

        assert!(store.remove_task(&task.id).into_inner());
        assert!(!store.remove_task(&task.id).into_inner());
        assert_eq!(store.len(), 1);
        assert!(store.task_by_id(&keep.id).is_some());
    }

    #[test]
    fn orderings_are_by_timestamp() {
        let mut store = TaskStore::default();
        let first = store
            .add_task(NewTask::new("Task 1", "First task").selector(".test1"))
            .expect("add")
            .into_inner();
        let second = store
            .add_task(NewTask::new("Task 2", "Second task").selector(".test2"))
            .expect("add")
            .into_inner();
        assert!(second.timestamp > first.timestamp);

        let newest_first: Vec<String> = store.all_tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(newest_first, vec![second.id.clone(), first.id.clone()]);

        let oldest_first: Vec<String> = store
            .all_tasks_chronological()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(oldest_first, vec![first.id, second.id]);
    }

    #[test]
    fn stats_count_by_status() {
        let mut store = TaskStore::default();
        assert_eq!(store.task_stats(), TaskStats::default());

        let ids: Vec<String> = (1..=3)
            .map(|n| {
                store
                    .add_task(NewTask::new(format!("Task {n}"), format!("Test {n}")).selector(format!(".test{n}")))
                    .expect("add")
                    .into_inner()
                    .id
            })
            .collect();
        let _ = store.set_task_status(&ids[1], TaskStatus::Doing);
        let _ = store.set_task_status(&ids[2], TaskStatus::Done);

        let stats = store.task_stats();
        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                to_do: 1,
                doing: 1,
                done: 1
            }
        );
        let json = serde_json::to_value(stats).expect("json");
        assert_eq!(json["to do"], 1);
        assert_eq!(json["total"], 3);
    }

    #[test]
    fn ids_are_unique() {
        let mut store = TaskStore::default();
        let mut seen = HashSet::new();
        for n in 0..50 {
            let task = store
                .add_task(NewTask::new("T", format!("comment {n}")).selector(".x"))
                .expect("add")
                .into_inner();
            assert!(seen.insert(task.id));
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = MemoryDir::new();
        let mut store = bound_store(&dir);
        let element = store
            .add_task(button_task().screenshot_path("./screenshots/a.png"))
            .expect("add")
            .into_inner();
        let _ = store
            .add_task(NewTask::new("R", "box").bounding_rect(BoundingRect::new(1.0, 2.0, 3.0, 4.0)))
            .expect("add");
        let _ = store.set_task_status(&element.id, TaskStatus::Doing);
        store.save_tasks_to_file().expect("save");
        assert!(!store.is_dirty());

        let mut fresh = bound_store(&dir);
        assert_eq!(fresh.load_tasks_from_file().expect("load"), 2);
        assert_eq!(fresh.tasks(), store.tasks());
    }

    #[test]
    fn saved_file_is_a_camel_case_array() {
        let dir = MemoryDir::new();
        let mut store = bound_store(&dir);
        let _ = store
            .add_task(NewTask::new("Test Task", "Test comment").selector(".test"))
            .expect("add");
        let _ = store
            .add_task(NewTask::new("Free", "rect").bounding_rect(BoundingRect::new(0.0, 0.0, 10.0, 10.0)))
            .expect("add");
        store.save_tasks_to_file().expect("save");

        let bytes = dir.read(TASKS_FILE).expect("read").expect("file exists");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        let array = value.as_array().expect("array");
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["title"], "Test Task");
        assert_eq!(array[0]["status"], "to do");
        assert!(array[0]["timestamp"].is_i64());
        assert!(array[1]["selector"].is_null());
        assert_eq!(array[1]["boundingRect"]["w"], 10.0);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = MemoryDir::new();
        let mut store = bound_store(&dir);
        let task = store.add_task(button_task()).expect("add").into_inner();
        store.save_tasks_to_file().expect("save");
        let _ = store.remove_task(&task.id);
        store.save_tasks_to_file().expect("save");

        let mut fresh = bound_store(&dir);
        assert_eq!(fresh.load_tasks_from_file().expect("load"), 0);
    }

    #[test]
    fn load_accepts_extension_written_json() {
        let dir = MemoryDir::new();
        let json = r#"[
            {"id":"1","title":"Old","comment":"c","selector":".a","status":"done","timestamp":1000,"lastModified":2000},
            {"id":"2","title":"Free","comment":"d","selector":null,"boundingRect":{"x":1,"y":2,"width":30,"height":40},"status":"to do","timestamp":1500,"screenshotPath":null,"extra":true}
        ]"#;
        dir.write(TASKS_FILE, json.as_bytes()).expect("seed");

        let mut store = bound_store(&dir);
        assert_eq!(store.load_tasks_from_file().expect("load"), 2);
        let free = store.task_by_id("2").expect("task 2");
        assert_eq!(free.bounding_rect, Some(BoundingRect::new(1.0, 2.0, 30.0, 40.0)));
        assert!(free.screenshot_path.is_none());

        // new stamps continue after the newest loaded activity
        let added = store
            .add_task(NewTask::new("New", "n").selector(".n"))
            .expect("add")
            .into_inner();
        assert!(added.timestamp.timestamp_millis() > 2000);
    }

    #[test]
    fn unreadable_records_are_skipped_not_the_whole_file() {
        let dir = MemoryDir::new();
        let json = r#"[
            {"id":"keep","title":"Keep","comment":"c","selector":".a","status":"to do","timestamp":1000},
            {"id":"legacy","title":"Legacy","comment":"d","selector":".b","status":"doing","createdAt":900},
            {"id":"iso","title":"Iso","comment":"e","selector":null,"status":"to do","createdAt":"1970-01-01T00:00:02Z"},
            {"id":"broken","title":"Broken","comment":"f","status":"blocked","timestamp":1100},
            {"id":"no-stamp","title":"None","comment":"g","status":"to do"},
            42
        ]"#;
        dir.write(TASKS_FILE, json.as_bytes()).expect("seed");

        let mut store = bound_store(&dir);
        assert_eq!(store.load_tasks_from_file().expect("load"), 3);
        let legacy = store.task_by_id("legacy").expect("legacy kept");
        assert_eq!(legacy.timestamp.timestamp_millis(), 900);
        assert_eq!(
            store.task_by_id("iso").map(|t| t.timestamp.timestamp_millis()),
            Some(2000)
        );
        assert!(store.task_by_id("broken").is_none());

        let _ = store
            .add_task(NewTask::new("New", "n").selector(".n"))
            .expect("add");
        store.save_tasks_to_file().expect("save");

        let mut fresh = bound_store(&dir);
        assert_eq!(fresh.load_tasks_from_file().expect("reload"), 4);
        for id in ["keep", "legacy", "iso"] {
            assert!(fresh.task_by_id(id).is_some(), "{id} survived the save");
        }
    }

    #[test]
    fn timestamp_wins_over_created_at() {
        let record = serde_json::json!({"timestamp": 5, "createdAt": 9});
        assert_eq!(with_timestamp_fallback(record)["timestamp"], 5);
    }

    #[test]
    fn missing_empty_or_corrupt_file_loads_empty() {
        let dir = MemoryDir::new();
        let mut store = bound_store(&dir);
        let _ = store.add_task(button_task()).expect("add");

        assert_eq!(store.load_tasks_from_file().expect("missing"), 0);

        dir.write(TASKS_FILE, b"   \n").expect("write");
        assert_eq!(store.load_tasks_from_file().expect("empty"), 0);

        dir.write(TASKS_FILE, b"{not json").expect("write");
        assert_eq!(store.load_tasks_from_file().expect("corrupt"), 0);
        assert!(store.is_empty());

        // capture keeps working after a corrupt load
        let _ = store.add_task(button_task()).expect("add after corrupt");
        store.save_tasks_to_file().expect("save heals file");
        let mut fresh = bound_store(&dir);
        assert_eq!(fresh.load_tasks_from_file().expect("load"), 1);
    }

    #[test]
    fn failed_save_keeps_memory_and_dirty_flag() {
        let dir = MemoryDir::new();
        let mut store = bound_store(&dir);
        let task = store.add_task(button_task()).expect("add").into_inner();

        dir.set_read_only(true);
        let err = store.save_tasks_to_file().expect_err("read-only");
        assert!(err.is_transient());
        assert!(store.is_dirty());
        assert_eq!(store.task_by_id(&task.id), Some(&task));

        let err = store
            .update_task_status_and_save(&task.id, "doing")
            .expect_err("still read-only");
        assert!(err.is_transient());
        assert_eq!(
            store.task_by_id(&task.id).map(|t| t.status),
            Some(TaskStatus::Doing)
        );

        dir.set_read_only(false);
        let change = store
            .update_task_status_and_save(&task.id, "done")
            .expect("save works again");
        assert!(change.is_changed());
        assert!(!store.is_dirty());
    }

    #[test]
    fn file_io_requires_initialize() {
        let mut store = TaskStore::default();
        assert!(!store.is_initialized());
        assert!(matches!(store.save_tasks_to_file(), Err(Error::NotConnected(_))));
        assert!(matches!(store.load_tasks_from_file(), Err(Error::NotConnected(_))));
    }

    #[test]
    fn store_persists_through_filesystem() {
        let temp = tempdir().expect("tempdir");
        let dir = FsDir::create(temp.path()).expect("dir");
        let mut store = TaskStore::default();
        store.initialize(Box::new(dir.clone()));
        let _ = store.add_task(button_task()).expect("add");
        store.save_tasks_to_file().expect("save");
        assert!(temp.path().join(TASKS_FILE).exists());

        let mut fresh = TaskStore::default();
        fresh.initialize(Box::new(dir));
        assert_eq!(fresh.load_tasks_from_file().expect("load"), 1);
    }

    #[test]
    fn screenshot_paths_can_be_cleared() {
        let mut store = TaskStore::default();
        let with_shot = store
            .add_task(button_task().screenshot_path("./screenshots/x.png"))
            .expect("add")
            .into_inner();
        let _ = store
            .add_task(NewTask::new("No shot", "c").selector(".b"))
            .expect("add");

        let single = store.set_screenshot_path(&with_shot.id, None);
        assert!(single.is_changed());
        assert!(single.into_inner().expect("task").screenshot_path.is_none());

        let _ = store.set_screenshot_path(&with_shot.id, Some("./screenshots/y.png".to_string()));
        let cleared = store.clear_screenshot_paths();
        assert_eq!(*cleared.value(), 1);
        assert!(!store.clear_screenshot_paths().is_changed());
        assert!(store.tasks().iter().all(|t| t.screenshot_path.is_none()));
    }

    #[test]
    fn rect_parses_from_cli_form() {
        let rect: BoundingRect = "10, 20,30,40.5".parse().expect("parse");
        assert_eq!(rect, BoundingRect::new(10.0, 20.0, 30.0, 40.5));
        assert!("1,2,3".parse::<BoundingRect>().is_err());
        assert!("1,2,x,4".parse::<BoundingRect>().is_err());
    }
}
