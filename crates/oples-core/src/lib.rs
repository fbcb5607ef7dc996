pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod merge;
pub mod month;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod types;
pub mod workbook;

pub use config::{DbConfig, ReportConfig};
pub use error::{InputError, PipelineError, ReportError, StorageError};
pub use loader::{load, LoadOptions, LoadSummary};
pub use merge::merge;
pub use report::report;
pub use store::{MemoryStore, PostgresStore, ServiceLogStore};
pub use types::{CombinedRecord, ServiceEntry};
