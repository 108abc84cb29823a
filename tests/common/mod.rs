#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

use maniva_survey::{config::SurveyConfig, frame::SurveyTable, preprocess};

pub const SURVEY_FIXTURE: &str = "juruti_sample.csv";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The sample export prepared with the built-in configuration.
pub fn prepared_survey() -> SurveyTable {
    let bytes = std::fs::read(fixture_path(SURVEY_FIXTURE)).expect("read survey fixture");
    let (table, _) = preprocess::load_survey_bytes(&bytes, b',', UTF_8, &SurveyConfig::default())
        .expect("prepare survey fixture");
    table
}

pub fn maniva() -> Command {
    let mut cmd = Command::cargo_bin("maniva").expect("binary exists");
    cmd.env_remove("MANIVA_API_KEY").env("RUST_LOG", "off");
    cmd
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
