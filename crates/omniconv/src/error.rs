use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Worker pool error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl ConvertError {
    /// Machine-readable error code carried on per-file failure records.
    pub fn code(&self) -> &'static str {
        match self {
            ConvertError::Validation(e) => e.code(),
            ConvertError::Dispatch(e) => e.code(),
            ConvertError::Engine(e) => e.code(),
            ConvertError::Storage(e) => e.code(),
            ConvertError::Config(_)
            | ConvertError::Job(_)
            | ConvertError::Worker(_)
            | ConvertError::Database(_) => "SYSTEM_ERROR",
        }
    }
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty filename")]
    EmptyFilename,

    #[error("Filename too long (maximum {max} characters)")]
    FilenameTooLong { max: usize },

    #[error("Filename contains invalid characters")]
    InvalidFilenameChars,

    #[error("Filename contains path traversal characters")]
    PathTraversal,

    #[error("Suspicious filename: {reason}")]
    SuspiciousFilename { reason: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size} bytes exceeds {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Filename has no extension")]
    NoExtension,

    #[error("Dangerous file type: .{ext}")]
    DangerousExtension { ext: String },

    #[error("Unsupported file type: .{ext}")]
    UnsupportedExtension { ext: String },

    #[error("File appears to be executable ({format})")]
    ExecutableContent { format: String },

    #[error("No files provided")]
    EmptyBatch,

    #[error("Too many files: {count} exceeds maximum of {limit} per batch")]
    TooManyFiles { count: usize, limit: usize },

    #[error("Total batch size too large: {size} bytes exceeds {limit} byte limit")]
    BatchSizeExceeded { size: u64, limit: u64 },

    #[error("Declared type .{declared} does not match detected type {detected}")]
    MimeMismatch { declared: String, detected: String },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyFilename => "EMPTY_FILENAME",
            ValidationError::FilenameTooLong { .. } => "FILENAME_TOO_LONG",
            ValidationError::InvalidFilenameChars => "INVALID_FILENAME_CHARS",
            ValidationError::PathTraversal => "PATH_TRAVERSAL",
            ValidationError::SuspiciousFilename { .. } => "SUSPICIOUS_FILENAME",
            ValidationError::EmptyFile => "EMPTY_FILE",
            ValidationError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ValidationError::NoExtension => "NO_EXTENSION",
            ValidationError::DangerousExtension { .. } => "DANGEROUS_EXTENSION",
            ValidationError::UnsupportedExtension { .. } => "UNSUPPORTED_EXTENSION",
            ValidationError::ExecutableContent { .. } => "EXECUTABLE_CONTENT",
            ValidationError::EmptyBatch => "NO_FILES",
            ValidationError::TooManyFiles { .. } => "TOO_MANY_FILES",
            ValidationError::BatchSizeExceeded { .. } => "BATCH_SIZE_EXCEEDED",
            ValidationError::MimeMismatch { .. } => "MIME_MISMATCH",
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No target format specified for file and no job-level default")]
    MissingTargetFormat,

    #[error("Cannot convert {source_category} file to {target_category} format '{target}'")]
    CategoryMismatch {
        source_category: String,
        target_category: String,
        target: String,
    },

    #[error("No conversion engine available for {from} to {to}")]
    NoEngine { from: String, to: String },

    #[error("Job was cancelled before dispatch")]
    Cancelled,
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::MissingTargetFormat => "MISSING_TARGET_FORMAT",
            DispatchError::CategoryMismatch { .. } => "CATEGORY_MISMATCH",
            DispatchError::NoEngine { .. } => "NO_ENGINE",
            DispatchError::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine '{0}' is not available on this system")]
    Unavailable(&'static str),

    #[error("Engine '{engine}' failed: {message}")]
    Failed {
        engine: &'static str,
        message: String,
    },

    #[error("Engine '{engine}' timed out after {timeout_secs}s")]
    Timeout {
        engine: &'static str,
        timeout_secs: u64,
    },

    #[error("Invalid conversion options: {0}")]
    InvalidOptions(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Unavailable(_) => "ENGINE_UNAVAILABLE",
            EngineError::Failed { .. } => "ENGINE_FAILED",
            EngineError::Timeout { .. } => "ENGINE_TIMEOUT",
            EngineError::InvalidOptions(_) => "INVALID_OPTIONS",
        }
    }

    /// Name of the engine the failure occurred in, when known.
    pub fn engine(&self) -> Option<&'static str> {
        match self {
            EngineError::Unavailable(engine) => Some(engine),
            EngineError::Failed { engine, .. } => Some(engine),
            EngineError::Timeout { engine, .. } => Some(engine),
            EngineError::InvalidOptions(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Cleanup scan failed for '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        "SYSTEM_ERROR"
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
}

pub type Result<T> = std::result::Result<T, ConvertError>;
