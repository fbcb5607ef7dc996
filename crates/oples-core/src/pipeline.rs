use std::path::{Path, PathBuf};

use oples_sheets::{read_table_from_bytes, read_table_from_path, Table};
use serde::Serialize;
use tracing::info;

use crate::config::ReportConfig;
use crate::error::{InputError, Result};
use crate::loader::{self, LoadOptions, LoadSummary};
use crate::merge;
use crate::report;
use crate::store::ServiceLogStore;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub load: LoadSummary,
    pub report_path: PathBuf,
}

/// The two uploaded spreadsheets.
#[derive(Debug, Clone)]
pub struct Uploads {
    pub tickets: Table,
    pub detail: Table,
}

impl Uploads {
    pub fn from_paths(tickets: &Path, detail: &Path) -> Result<Self, InputError> {
        Ok(Self {
            tickets: read_table_from_path(tickets).map_err(|source| InputError::Unreadable {
                input: merge::TICKETS_INPUT,
                source,
            })?,
            detail: read_table_from_path(detail).map_err(|source| InputError::Unreadable {
                input: merge::DETAIL_INPUT,
                source,
            })?,
        })
    }

    pub fn from_bytes(tickets: &[u8], detail: &[u8]) -> Result<Self, InputError> {
        Ok(Self {
            tickets: read_table_from_bytes(merge::TICKETS_INPUT, tickets).map_err(|source| {
                InputError::Unreadable {
                    input: merge::TICKETS_INPUT,
                    source,
                }
            })?,
            detail: read_table_from_bytes(merge::DETAIL_INPUT, detail).map_err(|source| {
                InputError::Unreadable {
                    input: merge::DETAIL_INPUT,
                    source,
                }
            })?,
        })
    }
}

/// Merges the uploads, loads the new entries and regenerates the report, in
/// that order. Input errors surface before any storage access.
pub async fn run<S>(
    store: &S,
    uploads: &Uploads,
    report_config: &ReportConfig,
    options: LoadOptions,
) -> Result<PipelineOutcome>
where
    S: ServiceLogStore + ?Sized,
{
    let records = merge::merge(&uploads.tickets, &uploads.detail)?;
    let load = loader::load(store, &records, options).await?;
    let report_path = report::report(store, report_config).await?;

    info!(
        inserted = load.inserted_count,
        report = %report_path.display(),
        "pipeline finished"
    );

    Ok(PipelineOutcome { load, report_path })
}
