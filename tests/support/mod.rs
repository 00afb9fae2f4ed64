#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use moat::task::Task;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Empty project directory, not yet connected
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Project directory after a successful `moat init`
    pub fn init() -> Self {
        let project = Self::new();
        project.cmd().arg("init").assert().success();
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn moat_dir(&self) -> PathBuf {
        self.dir.path().join(".moat")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = moat_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    /// `moat add` with a selector; returns the task id
    pub fn add(&self, title: &str, comment: &str, selector: &str) -> String {
        let value = self.json(&[
            "add",
            "--title",
            title,
            "--comment",
            comment,
            "--selector",
            selector,
        ]);
        value["data"]["task"]["id"]
            .as_str()
            .expect("task id")
            .to_string()
    }

    pub fn write_file(&self, rel_path: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read_tasks(&self) -> Vec<Task> {
        let contents = fs::read(self.moat_dir().join("moat-tasks-detail.json"))
            .expect("read task snapshot");
        serde_json::from_slice(&contents).expect("task snapshot json")
    }

    pub fn read_markdown(&self) -> String {
        fs::read_to_string(self.moat_dir().join("moat-tasks.md")).expect("read markdown")
    }
}

pub fn moat_cmd() -> Command {
    let mut cmd = Command::cargo_bin("moat").expect("binary");
    cmd.env_remove("MOAT_PROJECT").env_remove("RUST_LOG");
    cmd
}
