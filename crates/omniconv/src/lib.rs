pub mod batch;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod formats;
pub mod job;
pub mod logging;
pub mod sanitize;
pub mod service;
pub mod storage;
pub mod validate;
pub mod worker;

pub use batch::{BatchCoordinator, BatchReport, BroadcastProgress, NoopProgress, ProgressReporter};
pub use broadcast::{JobEvent, JobEventBroadcaster};
pub use config::{load_config, Config, ContentCheckPolicy};
pub use engine::{
    ConversionEngine, ConversionOutcome, Dispatcher, EngineRegistry, SupportedConversion,
};
pub use error::{ConvertError, Result};
pub use formats::FileCategory;
pub use job::{ConversionOptions, Job, JobManager, JobStatus};
pub use service::{CleanupReport, ConversionService, Upload};
pub use storage::{FileStorage, Storage};
pub use validate::FormatValidator;
