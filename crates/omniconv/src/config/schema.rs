use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_max_files_per_batch")]
    pub max_files_per_batch: usize,
    #[serde(default = "default_conversion_timeout_secs")]
    pub conversion_timeout_secs: u64,
    #[serde(default = "default_workers_per_job")]
    pub workers_per_job: usize,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default)]
    pub content_check: ContentCheckPolicy,
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_output_directory() -> String {
    "converted".to_string()
}

fn default_max_file_size_mb() -> u64 {
    100
}

fn default_max_files_per_batch() -> usize {
    50
}

fn default_conversion_timeout_secs() -> u64 {
    300
}

fn default_workers_per_job() -> usize {
    num_cpus::get().min(4)
}

fn default_retention_hours() -> u64 {
    24
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            output_directory: default_output_directory(),
            max_file_size_mb: default_max_file_size_mb(),
            max_files_per_batch: default_max_files_per_batch(),
            conversion_timeout_secs: default_conversion_timeout_secs(),
            workers_per_job: default_workers_per_job(),
            retention_hours: default_retention_hours(),
            content_check: ContentCheckPolicy::default(),
            database_path: None,
        }
    }
}

impl Config {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn conversion_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.conversion_timeout_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }
}

/// What to do when a file's sniffed content type disagrees with its declared
/// extension. Executable signatures are rejected regardless of this policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCheckPolicy {
    #[default]
    Log,
    Enforce,
}
