use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("failed to open workbook {source_name}: {source}")]
    Open {
        source_name: String,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("workbook {source_name} does not contain any worksheets")]
    NoWorksheets { source_name: String },

    #[error("worksheet '{sheet}' has no header row")]
    MissingHeader { sheet: String },

    #[error("failed to read worksheet '{sheet}': {source}")]
    Worksheet {
        sheet: String,
        #[source]
        source: calamine::XlsxError,
    },
}
