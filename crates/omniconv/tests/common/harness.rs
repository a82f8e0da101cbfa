//! Test harness for isolated service execution.

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use omniconv::{Config, ConversionService};

/// Isolated environment for exercising the full conversion stack: temp
/// upload and output roots plus a service built over them.
pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub service: ConversionService,
}

impl TestHarness {
    /// Create a harness with default settings and two workers.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after letting the caller adjust the config.
    /// Directories are already pointed at the temp root when the closure
    /// runs.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let output_dir = temp_dir.path().join("converted");

        let mut config = Config {
            upload_directory: upload_dir.to_string_lossy().into_owned(),
            output_directory: output_dir.to_string_lossy().into_owned(),
            workers_per_job: 2,
            ..Config::default()
        };
        tweak(&mut config);

        let service = ConversionService::from_config(config).expect("Failed to build service");
        Self {
            temp_dir,
            upload_dir,
            output_dir,
            service,
        }
    }

    /// Path for an on-disk job database inside the temp root.
    pub fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("jobs.sqlite")
    }

    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}
