use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};

use crate::errors::SheetError;
use crate::model::{Cell, Table};

/// Reads the first worksheet of an `.xlsx` file on disk.
pub fn read_table_from_path(path: impl AsRef<Path>) -> Result<Table, SheetError> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let workbook: Xlsx<_> = open_workbook(path).map_err(|source| SheetError::Open {
        source_name: source_name.clone(),
        source,
    })?;
    read_first_sheet(workbook, &source_name)
}

/// Reads the first worksheet of an `.xlsx` workbook held in memory, as
/// received from an upload.
pub fn read_table_from_bytes(source_name: &str, bytes: &[u8]) -> Result<Table, SheetError> {
    let workbook = Xlsx::new(Cursor::new(bytes)).map_err(|source| SheetError::Open {
        source_name: source_name.to_string(),
        source,
    })?;
    read_first_sheet(workbook, source_name)
}

fn read_first_sheet<RS: Read + Seek>(
    mut workbook: Xlsx<RS>,
    source_name: &str,
) -> Result<Table, SheetError> {
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SheetError::NoWorksheets {
            source_name: source_name.to_string(),
        })?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|source| SheetError::Worksheet {
            sheet: sheet.clone(),
            source,
        })?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()));

    let header_row = rows
        .next()
        .ok_or_else(|| SheetError::MissingHeader { sheet: sheet.clone() })?;

    let mut table = Table::new(header_names(&header_row));
    for row in rows {
        table.push_row(row);
    }

    Ok(table)
}

/// Header labels, trimmed. Blank headers get a positional name and repeated
/// headers get a numeric suffix (`Name`, `Name.1`, ...).
fn header_names(row: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    row.iter()
        .enumerate()
        .map(|(index, cell)| {
            let base = match cell.to_label() {
                Some(label) if !label.trim().is_empty() => label.trim().to_string(),
                _ => format!("Unnamed: {index}"),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(text) if text.is_empty() => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Int(value) => Cell::Int(*value),
        Data::Float(value) => Cell::Float(*value),
        Data::Bool(value) => Cell::Bool(*value),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => Cell::DateTime(datetime),
            None => Cell::Float(value.as_f64()),
        },
        Data::DateTimeIso(text) => parse_iso_datetime(text)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(text.clone())),
        Data::DurationIso(text) => Cell::Text(text.clone()),
    }
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
