use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::month;
use crate::normalize::{self, Rejection};
use crate::store::ServiceLogStore;
use crate::types::{CombinedRecord, ServiceEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Compute the summary without writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LoadSummary {
    pub received: usize,
    pub incomplete: usize,
    pub invalid: usize,
    pub already_persisted: usize,
    pub batch_duplicates: usize,
    pub inserted_count: usize,
    pub dry_run: bool,
    /// Inserted rows per `MM/YYYY`, newest first by text order.
    pub monthly_distribution: Vec<MonthCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

/// Result of cleaning a batch: storable entries in input order plus the
/// number of rows dropped at each stage.
#[derive(Debug, Default)]
pub struct CleanBatch {
    pub entries: Vec<ServiceEntry>,
    pub incomplete: usize,
    pub invalid: usize,
}

#[derive(Debug, Default)]
pub struct Selection {
    pub entries: Vec<ServiceEntry>,
    pub already_persisted: usize,
    pub batch_duplicates: usize,
}

/// Cleans, deduplicates and persists a merged batch.
///
/// Rows that fail cleaning are dropped and counted. Storage failures abort the
/// whole batch; nothing is committed in that case.
pub async fn load<S>(
    store: &S,
    records: &[CombinedRecord],
    options: LoadOptions,
) -> Result<LoadSummary, StorageError>
where
    S: ServiceLogStore + ?Sized,
{
    let lock = store.lock_for_load().await?;
    let result = load_locked(store, records, options).await;
    settle(result, lock.release().await)
}

/// Combines the load outcome with the lock release. Once the batch has
/// committed, a failed unlock is only logged: the lock dies with its
/// connection and the rows are already stored.
fn settle(
    result: Result<LoadSummary, StorageError>,
    released: Result<(), StorageError>,
) -> Result<LoadSummary, StorageError> {
    if let Err(err) = released {
        warn!("failed to release load lock: {err}");
    }
    result
}

async fn load_locked<S>(
    store: &S,
    records: &[CombinedRecord],
    options: LoadOptions,
) -> Result<LoadSummary, StorageError>
where
    S: ServiceLogStore + ?Sized,
{
    let cleaned = clean(records);
    let existing = store.existing_ids().await?;
    let mut selection = select_new(cleaned.entries, &existing);
    sort_by_month_text_desc(&mut selection.entries);

    if selection.entries.is_empty() {
        info!("no new service log entries to insert");
    } else if options.dry_run {
        info!(
            candidates = selection.entries.len(),
            "dry run; skipping insert"
        );
    } else {
        store.insert_entries(&selection.entries).await?;
    }

    let inserted = if options.dry_run {
        0
    } else {
        selection.entries.len()
    };

    let summary = LoadSummary {
        received: records.len(),
        incomplete: cleaned.incomplete,
        invalid: cleaned.invalid,
        already_persisted: selection.already_persisted,
        batch_duplicates: selection.batch_duplicates,
        inserted_count: inserted,
        dry_run: options.dry_run,
        monthly_distribution: monthly_distribution(&selection.entries),
    };

    info!(
        received = summary.received,
        inserted = summary.inserted_count,
        incomplete = summary.incomplete,
        invalid = summary.invalid,
        already_persisted = summary.already_persisted,
        batch_duplicates = summary.batch_duplicates,
        "service log load finished"
    );
    for bucket in &summary.monthly_distribution {
        info!(month = %bucket.month, count = bucket.count, "monthly distribution");
    }

    Ok(summary)
}

/// Normalizes every record and keeps the storable ones, in input order.
pub fn clean(records: &[CombinedRecord]) -> CleanBatch {
    let mut batch = CleanBatch::default();

    for (position, record) in records.iter().enumerate() {
        match normalize::normalize(record).and_then(normalize::validate) {
            Ok(entry) => batch.entries.push(entry),
            Err(Rejection::Incomplete) => {
                debug!(position, "dropping row with blank service, ticket or C_Id");
                batch.incomplete += 1;
            }
            Err(Rejection::Invalid) => {
                debug!(position, "dropping row with invalid creation date or C_Id");
                batch.invalid += 1;
            }
        }
    }

    batch
}

/// Drops entries whose `C_Id` is already persisted, then keeps the first
/// occurrence of each remaining `C_Id`.
pub fn select_new(entries: Vec<ServiceEntry>, existing: &HashSet<i64>) -> Selection {
    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    for entry in entries {
        if existing.contains(&entry.c_id) {
            selection.already_persisted += 1;
        } else if !seen.insert(entry.c_id) {
            selection.batch_duplicates += 1;
        } else {
            selection.entries.push(entry);
        }
    }

    selection
}

/// Stable sort on the `MM/YYYY` text, newest first by text order (see
/// [`month::text_desc`]).
pub fn sort_by_month_text_desc(entries: &mut [ServiceEntry]) {
    entries.sort_by(|a, b| month::text_desc(&a.fecha, &b.fecha));
}

/// Counts entries per month, ordered like [`sort_by_month_text_desc`].
pub fn monthly_distribution(entries: &[ServiceEntry]) -> Vec<MonthCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.fecha.as_str()).or_insert(0) += 1;
    }

    let mut distribution: Vec<MonthCount> = counts
        .into_iter()
        .map(|(month, count)| MonthCount {
            month: month.to_string(),
            count,
        })
        .collect();
    distribution.sort_by(|a, b| month::text_desc(&a.month, &b.month));
    distribution
}
