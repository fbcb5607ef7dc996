use oples_sheets::SheetError;
use thiserror::Error;

/// Upload problems detected before anything touches storage.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("{input} spreadsheet could not be read: {source}")]
    Unreadable {
        input: &'static str,
        #[source]
        source: SheetError,
    },

    #[error("{input} spreadsheet is missing required column '{column}'")]
    MissingColumn {
        input: &'static str,
        column: &'static str,
    },

    #[error("column '{column}' appears in both spreadsheets; cannot tell which one to use")]
    AmbiguousColumn { column: &'static str },

    #[error("{input} spreadsheet already has a '{column}' column, which collides with the join columns")]
    ColumnCollision {
        input: &'static str,
        column: &'static str,
    },
}

/// Connectivity or write failures while loading. The batch is never partially
/// committed when this is returned.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("service log already contains C_Id {0}")]
    DuplicateKey(i64),
}

/// Query or rendering failures while building the consolidated workbook.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read service log: {0}")]
    Storage(#[from] StorageError),

    #[error("stored month '{0}' is not in MM/YYYY format")]
    InvalidMonth(String),

    #[error("aggregation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("failed to render workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} must be set")]
    MissingVar { name: &'static str },

    #[error("environment variable {name} is invalid: {message}")]
    InvalidVar { name: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of one stage of the merge, load and report sequence.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
