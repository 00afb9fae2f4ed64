//! moat init command implementation
//!
//! Connects a project: creates `.moat/`, its screenshots directory, the
//! two task files and a default `.moat.toml`.

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::project::Project;
use crate::storage::MOAT_DIR;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    tasks: usize,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    moat_dir: bool,
}

pub fn run(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let root = super::project_root(root)?;

    let created_moat_dir = !root.join(MOAT_DIR).is_dir();
    let created_config = ensure_config(&root)?;
    let config = Config::load_from_root(&root)?;
    let project = Project::connect(&root, config)?;

    let report = InitReport {
        root: root.clone(),
        tasks: project.store().len(),
        created: InitCreated {
            config: created_config,
            moat_dir: created_moat_dir,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_moat_dir {
        created_items.push(format!("{MOAT_DIR}/"));
    }

    let header = if created_items.is_empty() {
        "moat init: already connected"
    } else {
        "moat init: connected project"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_summary("tasks", report.tasks.to_string());
    human.push_next_step("moat add --title <title> --comment <comment> --selector <css>");

    emit_success(output, "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    std::fs::create_dir_all(root)?;
    Config::default().save(&path)?;
    Ok(true)
}
