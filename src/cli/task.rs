//! moat task command implementations.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::markdown::MARKDOWN_FILE;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::MOAT_DIR;
use crate::task::{BoundingRect, NewTask, Task, TaskStatus, TaskStore};

pub struct AddOptions {
    pub title: String,
    pub comment: String,
    pub selector: Option<String>,
    pub rect: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct ListOptions {
    pub chronological: bool,
    pub status: Option<String>,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct TaskAddedOutput {
    created: bool,
    task: Task,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct TaskStatusOutput {
    id: String,
    updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
}

#[derive(Serialize)]
struct TaskRemovedOutput {
    id: String,
    removed: bool,
}

#[derive(Serialize)]
struct RebuildOutput {
    file: &'static str,
    bytes: usize,
    tasks: usize,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut project = super::open_project(options.root)?;

    let mut input = NewTask::new(options.title, options.comment);
    input.selector = options.selector;
    if let Some(rect) = options.rect.as_deref() {
        input = input.bounding_rect(rect.parse::<BoundingRect>()?);
    }
    let png = match options.screenshot.as_ref() {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };

    let change = project.add_task(input)?;
    let created = change.is_changed();
    let mut task = change.into_inner();

    let mut human = HumanOutput::new(if created {
        "Task created"
    } else {
        "Task already exists"
    });
    if !created {
        human.push_warning("matches a live task with the same target and comment; nothing added");
    }

    if let Some(png) = png {
        if created {
            if let Some(updated) = project.attach_screenshot(&task.id, &png)?.into_inner() {
                task = updated;
            }
        } else {
            human.push_warning("screenshot not attached to the existing task");
        }
    }

    push_task_summary(&mut human, &task);
    human.push_next_step(format!("moat status {} doing", short_id(&task.id)));

    emit_success(
        options.output,
        "add",
        &TaskAddedOutput { created, task },
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let project = super::open_project(options.root)?;
    let status = options
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;

    let store = project.store();
    let mut tasks = if options.chronological {
        store.all_tasks_chronological()
    } else {
        store.all_tasks()
    };
    if let Some(status) = status {
        tasks.retain(|task| task.status == status);
    }

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    if let Some(status) = status {
        human.push_summary("Status", status.to_string());
    }
    for task in &tasks {
        human.push_detail(format!(
            "[{}] {} {} ({})",
            task.status,
            short_id(&task.id),
            task.title,
            task.selector.as_deref().unwrap_or("freeform")
        ));
    }
    if tasks.is_empty() && store.is_empty() {
        human.push_next_step("moat add --title <title> --comment <comment>");
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(options.output, "list", &output, Some(&human))
}

pub fn run_show(id: String, root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let project = super::open_project(root)?;
    let resolved = resolve_task_id(project.store(), &id)?;
    let task = project
        .store()
        .task_by_id(&resolved)
        .cloned()
        .ok_or_else(|| Error::InvalidArgument(format!("task not found: {id}")))?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    push_task_summary(&mut human, &task);
    human.push_detail(task.comment.clone());

    emit_success(output, "show", &task, Some(&human))
}

pub fn run_status(
    id: String,
    status: String,
    root: Option<PathBuf>,
    output: OutputOptions,
) -> Result<()> {
    let mut project = super::open_project(root)?;
    let resolved = resolve_task_id(project.store(), &id)?;
    let task = project.update_task_status(&resolved, &status)?.into_inner();

    let mut human = HumanOutput::new(if task.is_some() {
        "Task status updated"
    } else {
        "Task status unchanged"
    });
    match task.as_ref() {
        Some(task) => push_task_summary(&mut human, task),
        None => human.push_warning(format!("no task with id {id}")),
    }

    let report = TaskStatusOutput {
        id: resolved,
        updated: task.is_some(),
        task,
    };
    emit_success(output, "status", &report, Some(&human))
}

pub fn run_rm(id: String, root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let mut project = super::open_project(root)?;
    let resolved = resolve_task_id(project.store(), &id)?;
    let removed = project.remove_task(&resolved)?.into_inner();

    let mut human = HumanOutput::new(if removed {
        "Task removed"
    } else {
        "Nothing removed"
    });
    human.push_summary("ID", resolved.clone());
    if !removed {
        human.push_warning(format!("no task with id {id}"));
    }

    emit_success(
        output,
        "rm",
        &TaskRemovedOutput {
            id: resolved,
            removed,
        },
        Some(&human),
    )
}

pub fn run_stats(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let project = super::open_project(root)?;
    let stats = project.store().task_stats();

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("Total", stats.total.to_string());
    human.push_summary("To Do", stats.to_do.to_string());
    human.push_summary("Doing", stats.doing.to_string());
    human.push_summary("Done", stats.done.to_string());

    emit_success(output, "stats", &stats, Some(&human))
}

pub fn run_rebuild(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let mut project = super::open_project(root)?;
    let content = project.rebuild()?;

    let report = RebuildOutput {
        file: MARKDOWN_FILE,
        bytes: content.len(),
        tasks: project.store().len(),
    };
    let mut human = HumanOutput::new("Markdown rebuilt");
    human.push_summary("File", format!("{MOAT_DIR}/{MARKDOWN_FILE}"));
    human.push_summary("Tasks", report.tasks.to_string());

    emit_success(output, "rebuild", &report, Some(&human))
}

/// Exact id, or a prefix that matches exactly one task. Unmatched input
/// is returned as-is so callers can report it as not found.
fn resolve_task_id(store: &TaskStore, input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    if store.task_by_id(input).is_some() {
        return Ok(input.to_string());
    }

    let matches: Vec<&Task> = store
        .tasks()
        .iter()
        .filter(|task| task.id.starts_with(input))
        .collect();
    match matches.as_slice() {
        [] => Ok(input.to_string()),
        [task] => Ok(task.id.clone()),
        _ => Err(Error::InvalidArgument(format!(
            "task id prefix '{input}' matches {} tasks",
            matches.len()
        ))),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.to_string());
    human.push_summary(
        "Target",
        task.selector.clone().unwrap_or_else(|| "freeform".to_string()),
    );
    if let Some(rect) = task.bounding_rect {
        human.push_summary(
            "Rect",
            format!("{},{},{},{}", rect.x, rect.y, rect.w, rect.h),
        );
    }
    if let Some(path) = task.screenshot_path.as_ref() {
        human.push_summary("Screenshot", path.clone());
    }
}
