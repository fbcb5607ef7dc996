use std::collections::HashMap;

use oples_sheets::{Cell, Table};
use tracing::info;

use crate::error::InputError;
use crate::types::CombinedRecord;

pub const TICKETS_INPUT: &str = "tickets";
pub const DETAIL_INPUT: &str = "detail";

/// Join key shared by both uploads after renaming.
pub const JOIN_COLUMN: &str = "id";
/// Record identifier, renamed from the detail upload's `ID`.
pub const RECORD_ID_COLUMN: &str = "C_Id";
const DETAIL_TICKET_COLUMN: &str = "Ticket";
const DETAIL_ID_COLUMN: &str = "ID";

/// Export header, the field it feeds and the upload it normally comes from,
/// for every projected column other than the two identifiers.
const PROJECTED_COLUMNS: [(&str, Field, &str); 6] = [
    ("Servei/Projecte - OPLES", Field::Servicios, TICKETS_INPUT),
    ("Assumpte", Field::Asunto, TICKETS_INPUT),
    ("Time Taken", Field::TiempoTrabajado, TICKETS_INPUT),
    ("Creat per", Field::Responsable, TICKETS_INPUT),
    ("Creat", Field::Fecha, TICKETS_INPUT),
    ("Contingut", Field::Descripcion, DETAIL_INPUT),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Servicios,
    Asunto,
    TiempoTrabajado,
    Responsable,
    Fecha,
    Descripcion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Tickets,
    Detail,
}

#[derive(Debug, Clone, Copy)]
struct ColumnSource {
    side: Side,
    index: usize,
}

/// Normalized join key. Integral numbers and integer text compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Int(i64),
    Text(String),
}

impl JoinKey {
    fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Int(value) => Some(JoinKey::Int(*value)),
            Cell::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                Some(JoinKey::Int(*value as i64))
            }
            Cell::Float(value) if value.is_finite() => Some(JoinKey::Text(value.to_string())),
            Cell::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else if let Ok(value) = trimmed.parse::<i64>() {
                    Some(JoinKey::Int(value))
                } else {
                    Some(JoinKey::Text(trimmed.to_string()))
                }
            }
            Cell::Bool(value) => Some(JoinKey::Text(value.to_string())),
            Cell::DateTime(value) => Some(JoinKey::Text(value.to_string())),
            Cell::Float(_) | Cell::Empty => None,
        }
    }
}

/// Inner-joins the tickets upload with the detail upload on the ticket id and
/// projects the result onto the eight combined fields.
///
/// Rows without a partner on the other side are dropped without error, and
/// an empty join yields an empty result. A ticket matching several detail
/// rows yields one record per pair, in tickets order then detail order.
pub fn merge(tickets: &Table, detail: &Table) -> Result<Vec<CombinedRecord>, InputError> {
    let mut detail = detail.clone();

    if tickets.has_column(RECORD_ID_COLUMN) {
        return Err(InputError::ColumnCollision {
            input: TICKETS_INPUT,
            column: RECORD_ID_COLUMN,
        });
    }
    for column in [JOIN_COLUMN, RECORD_ID_COLUMN] {
        if detail.has_column(column) {
            return Err(InputError::ColumnCollision {
                input: DETAIL_INPUT,
                column,
            });
        }
    }

    if !detail.rename_column(DETAIL_TICKET_COLUMN, JOIN_COLUMN) {
        return Err(InputError::MissingColumn {
            input: DETAIL_INPUT,
            column: DETAIL_TICKET_COLUMN,
        });
    }
    if !detail.rename_column(DETAIL_ID_COLUMN, RECORD_ID_COLUMN) {
        return Err(InputError::MissingColumn {
            input: DETAIL_INPUT,
            column: DETAIL_ID_COLUMN,
        });
    }

    let tickets_key = tickets
        .column_index(JOIN_COLUMN)
        .ok_or(InputError::MissingColumn {
            input: TICKETS_INPUT,
            column: JOIN_COLUMN,
        })?;
    let detail_key = detail
        .column_index(JOIN_COLUMN)
        .ok_or(InputError::MissingColumn {
            input: DETAIL_INPUT,
            column: JOIN_COLUMN,
        })?;
    let record_id = detail
        .column_index(RECORD_ID_COLUMN)
        .ok_or(InputError::MissingColumn {
            input: DETAIL_INPUT,
            column: RECORD_ID_COLUMN,
        })?;

    let mut sources = Vec::with_capacity(PROJECTED_COLUMNS.len());
    for (header, field, expected_input) in PROJECTED_COLUMNS {
        sources.push((field, locate(header, expected_input, tickets, &detail)?));
    }

    let mut detail_by_key: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for row in 0..detail.height() {
        if let Some(key) = JoinKey::from_cell(detail.cell(row, detail_key)) {
            detail_by_key.entry(key).or_default().push(row);
        }
    }

    let mut merged = Vec::new();
    for ticket_row in 0..tickets.height() {
        let Some(key) = JoinKey::from_cell(tickets.cell(ticket_row, tickets_key)) else {
            continue;
        };
        let Some(detail_rows) = detail_by_key.get(&key) else {
            continue;
        };

        for &detail_row in detail_rows {
            let pick = |source: ColumnSource| match source.side {
                Side::Tickets => tickets.cell(ticket_row, source.index).clone(),
                Side::Detail => detail.cell(detail_row, source.index).clone(),
            };

            let mut record = CombinedRecord {
                c_id: detail.cell(detail_row, record_id).clone(),
                id: tickets.cell(ticket_row, tickets_key).clone(),
                servicios: Cell::Empty,
                asunto: Cell::Empty,
                tiempo_trabajado: Cell::Empty,
                responsable: Cell::Empty,
                fecha: Cell::Empty,
                descripcion: Cell::Empty,
            };

            for &(field, source) in &sources {
                let value = pick(source);
                match field {
                    Field::Servicios => record.servicios = value,
                    Field::Asunto => record.asunto = value,
                    Field::TiempoTrabajado => record.tiempo_trabajado = value,
                    Field::Responsable => record.responsable = value,
                    Field::Fecha => record.fecha = value,
                    Field::Descripcion => record.descripcion = value,
                }
            }

            merged.push(record);
        }
    }

    info!(
        tickets = tickets.height(),
        detail = detail.height(),
        merged = merged.len(),
        "merged uploads"
    );

    Ok(merged)
}

fn locate(
    header: &'static str,
    expected_input: &'static str,
    tickets: &Table,
    detail: &Table,
) -> Result<ColumnSource, InputError> {
    match (tickets.column_index(header), detail.column_index(header)) {
        (Some(_), Some(_)) => Err(InputError::AmbiguousColumn { column: header }),
        (Some(index), None) => Ok(ColumnSource {
            side: Side::Tickets,
            index,
        }),
        (None, Some(index)) => Ok(ColumnSource {
            side: Side::Detail,
            index,
        }),
        (None, None) => Err(InputError::MissingColumn {
            input: expected_input,
            column: header,
        }),
    }
}
