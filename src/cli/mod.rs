//! Command-line interface for moat
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;
use crate::project::Project;

mod init;
mod screenshots;
mod task;

/// moat - annotation tasks for a web page, kept as JSON and markdown
///
/// Reads and writes the `.moat/` directory of a project: the task
/// snapshot, the generated task list and screenshot assets.
#[derive(Parser, Debug)]
#[command(name = "moat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root containing `.moat/` (defaults to current directory)
    #[arg(long, global = true, env = "MOAT_PROJECT")]
    pub project: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect a project directory (creates `.moat/`)
    Init,

    /// Add an annotation task
    Add {
        /// Short task title
        #[arg(long)]
        title: String,

        /// What should change
        #[arg(long)]
        comment: String,

        /// CSS selector of the annotated element (omit for freeform)
        #[arg(long)]
        selector: Option<String>,

        /// Annotated rectangle as x,y,w,h in page pixels
        #[arg(long)]
        rect: Option<String>,

        /// PNG file to attach as the task's screenshot
        #[arg(long)]
        screenshot: Option<PathBuf>,
    },

    /// List tasks (newest first)
    List {
        /// Oldest first, the order of the markdown file
        #[arg(long)]
        chronological: bool,

        /// Only tasks with this status: "to do", doing, done
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one task
    Show {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Set a task's status
    Status {
        /// Task id (or unique prefix)
        id: String,

        /// New status: "to do", doing, done
        status: String,
    },

    /// Remove a task
    Rm {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Task counts by status
    Stats,

    /// Regenerate `moat-tasks.md` from the task snapshot
    Rebuild,

    /// Screenshot asset management
    #[command(subcommand)]
    Screenshots(ScreenshotCommands),
}

/// Screenshot subcommands
#[derive(Subcommand, Debug)]
pub enum ScreenshotCommands {
    /// Number of stored screenshots
    Count,

    /// Delete all screenshots and clear task references
    Clear,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let root = self.project;

        match self.command {
            Commands::Init => init::run(root, output),
            Commands::Add {
                title,
                comment,
                selector,
                rect,
                screenshot,
            } => task::run_add(task::AddOptions {
                title,
                comment,
                selector,
                rect,
                screenshot,
                root,
                output,
            }),
            Commands::List {
                chronological,
                status,
            } => task::run_list(task::ListOptions {
                chronological,
                status,
                root,
                output,
            }),
            Commands::Show { id } => task::run_show(id, root, output),
            Commands::Status { id, status } => task::run_status(id, status, root, output),
            Commands::Rm { id } => task::run_rm(id, root, output),
            Commands::Stats => task::run_stats(root, output),
            Commands::Rebuild => task::run_rebuild(root, output),
            Commands::Screenshots(cmd) => match cmd {
                ScreenshotCommands::Count => screenshots::run_count(root, output),
                ScreenshotCommands::Clear => screenshots::run_clear(root, output),
            },
        }
    }
}

fn project_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

/// Open the already-connected project at `root`
fn open_project(root: Option<PathBuf>) -> Result<Project> {
    Project::open(project_root(root)?)
}
