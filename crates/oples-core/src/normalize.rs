//! Row-level cleaning for combined records.
//!
//! Cleaning never fails a batch. Each field is first normalized into an
//! optional value, then [`validate`] turns a [`NormalizedRow`] into a storable
//! [`ServiceEntry`] or drops it.

use chrono::NaiveDate;
use oples_sheets::Cell;
use tracing::debug;

use crate::month::Month;
use crate::types::{CombinedRecord, ServiceEntry};

/// Why a combined record was not turned into a service entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `Servicios`, `id` or `C_Id` was blank in the upload.
    Incomplete,
    /// `Fecha` or `C_Id` could not be normalized.
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub c_id: Option<i64>,
    pub ticket_id: String,
    pub servicios: String,
    pub asunto: Option<String>,
    pub tiempo_trabajado: i32,
    pub responsable: Option<String>,
    pub fecha: Option<String>,
    pub descripcion: Option<String>,
}

/// Normalizes one record, or reports it as incomplete when a required upload
/// field is blank.
pub fn normalize(record: &CombinedRecord) -> Result<NormalizedRow, Rejection> {
    if record.servicios.is_empty() || record.id.is_empty() || record.c_id.is_empty() {
        return Err(Rejection::Incomplete);
    }

    Ok(NormalizedRow {
        c_id: normalize_c_id(&record.c_id),
        ticket_id: record.id.to_label().unwrap_or_default(),
        servicios: record.servicios.to_label().unwrap_or_default(),
        asunto: record.asunto.to_label(),
        tiempo_trabajado: normalize_minutes(&record.tiempo_trabajado),
        responsable: record.responsable.to_label(),
        fecha: normalize_month(&record.fecha),
        descripcion: record.descripcion.to_label(),
    })
}

/// Keeps rows whose month and identifier both survived normalization.
pub fn validate(row: NormalizedRow) -> Result<ServiceEntry, Rejection> {
    let (Some(c_id), Some(fecha)) = (row.c_id, row.fecha) else {
        return Err(Rejection::Invalid);
    };

    Ok(ServiceEntry {
        c_id,
        ticket_id: row.ticket_id,
        servicios: row.servicios,
        asunto: row.asunto,
        tiempo_trabajado: row.tiempo_trabajado,
        responsable: row.responsable,
        fecha,
        descripcion: row.descripcion,
    })
}

/// Minutes worked as a non-negative integer. Anything that is not an integer
/// becomes 0, so a bad value is indistinguishable from a real zero.
pub fn normalize_minutes(cell: &Cell) -> i32 {
    let minutes = match cell {
        Cell::Int(value) => Some(*value),
        Cell::Float(value) if value.is_finite() => Some(value.trunc() as i64),
        Cell::Text(text) => text.trim().parse::<i64>().ok(),
        Cell::Bool(value) => Some(i64::from(*value)),
        _ => None,
    };

    minutes
        .filter(|value| *value >= 0)
        .and_then(|value| i32::try_from(value).ok())
        .unwrap_or(0)
}

/// Reduces a creation date to `MM/YYYY`.
///
/// Date cells are formatted directly. Text keeps only what precedes the first
/// whitespace and must then be a `YYYY-MM-DD` date. Anything else is absent.
pub fn normalize_month(cell: &Cell) -> Option<String> {
    match cell {
        Cell::DateTime(value) => Some(Month::from_datetime(value).to_string()),
        Cell::Text(text) => {
            let date_part = text.split_whitespace().next()?;
            match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                Ok(date) => Some(Month::from_date(&date).to_string()),
                Err(err) => {
                    debug!(value = %text, error = %err, "unparseable creation date");
                    None
                }
            }
        }
        _ => None,
    }
}

/// Record identifier as an integer, if it is one.
pub fn normalize_c_id(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(value) => Some(*value),
        Cell::Float(value) if value.is_finite() => Some(value.trunc() as i64),
        Cell::Text(text) => text.trim().parse::<i64>().ok(),
        Cell::Bool(value) => Some(i64::from(*value)),
        _ => None,
    }
}
