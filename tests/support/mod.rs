#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tally::storage::Storage;
use tally::store::FileStore;
use tempfile::TempDir;

pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Empty directory with no `.tally.toml` and no store.
    pub fn empty() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Workspace initialized through `tally init`.
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let workspace = Self::empty()?;
        workspace.cmd().arg("init").assert().success();
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(Storage::for_root(self.path().to_path_buf()))
    }

    /// `tally` with `--root` pointing at this workspace.
    pub fn cmd(&self) -> Command {
        let mut cmd = tally_cmd();
        cmd.arg("--root").arg(self.path());
        cmd
    }

    /// Run a command with `--json` and return the `data` payload.
    pub fn json(&self, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output)?;
        Ok(value["data"].clone())
    }
}

pub fn tally_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tally").expect("tally binary");
    cmd.env_remove("TALLY_ROOT").env_remove("RUST_LOG");
    cmd
}
