//! moat - annotation task store with a markdown mirror
//!
//! Tasks captured against a web page (an element selector or a freeform
//! rectangle plus a comment) are kept in memory, snapshotted as JSON and
//! mirrored into a human-readable markdown checklist.
//!
//! # Module Organization
//!
//! - `task`: Task model and the deduplicating task store
//! - `markdown`: Markdown generation from a task list
//! - `storage`: Directory capability the store persists through
//! - `screenshot`: Screenshot assets next to the task files
//! - `project`: A connected `.moat/` directory tying the above together
//! - `config`: Configuration loading from `.moat.toml`
//! - `lock`: File locking and atomic writes
//! - `error`: Error types and result aliases
//! - `output`, `cli`: The `moat` command-line surface

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod markdown;
pub mod output;
pub mod project;
pub mod screenshot;
pub mod storage;
pub mod task;

pub use error::{Error, Result};
pub use project::Project;
pub use task::{BoundingRect, NewTask, Task, TaskStats, TaskStatus, TaskStore};
