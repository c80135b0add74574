#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use canopy::config::Settings;
use tempfile::TempDir;

/// Scratch workspace root with a small forest configured to keep tests quick.
pub struct Workspace {
    temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_config("[training]\nn_trees = 15\n")
    }

    pub fn with_config(toml: &str) -> Self {
        let temp = tempfile::tempdir().expect("create tempdir");
        std::fs::write(temp.path().join("canopy.toml"), toml).expect("write canopy.toml");
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn settings(&self) -> Settings {
        Settings::load_from_root(self.root()).expect("load settings")
    }

    /// Run a stage binary with the workspace as its root.
    pub fn run(&self, binary: &str, args: &[&str]) -> Output {
        Command::new(binary)
            .args(args)
            .current_dir(self.root())
            .env("CANOPY_HOME", self.root())
            .env("RUST_LOG", "warn")
            .output()
            .expect("spawn stage binary")
    }
}
