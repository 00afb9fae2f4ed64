//! moat screenshots command implementations.

use std::path::PathBuf;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};

#[derive(serde::Serialize)]
struct ScreenshotCountOutput {
    count: usize,
}

#[derive(serde::Serialize)]
struct ScreenshotClearOutput {
    removed: usize,
}

pub fn run_count(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let project = super::open_project(root)?;
    let count = project.screenshots().count()?;

    let mut human = HumanOutput::new("Screenshots");
    human.push_summary("Count", count.to_string());

    emit_success(output, "screenshots count", &ScreenshotCountOutput { count }, Some(&human))
}

pub fn run_clear(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let mut project = super::open_project(root)?;
    let removed = project.clear_screenshots()?;

    let mut human = HumanOutput::new(if removed == 0 {
        "No screenshots to clear"
    } else {
        "Screenshots cleared"
    });
    human.push_summary("Removed", removed.to_string());

    emit_success(output, "screenshots clear", &ScreenshotClearOutput { removed }, Some(&human))
}
