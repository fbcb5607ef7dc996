//! Rendering of the consolidated report into an `.xlsx` workbook.

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::report::ReportData;

pub const SERVICES_SHEET: &str = "Resumen";
pub const PEOPLE_SHEET: &str = "Horas por Persona";
pub const TICKETS_SHEET: &str = "Detalle Tiquets";

const HEADER_BACKGROUND: u32 = 0x2E75B6;
const MINUTES_FORMAT: &str = "#,##0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Left,
    Center,
    Minutes,
}

struct ColumnSpec {
    header: &'static str,
    width: f64,
    style: Style,
}

const SERVICE_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec { header: "Servicio", width: 35.0, style: Style::Left },
    ColumnSpec { header: "Tiempo Total (minutos)", width: 20.0, style: Style::Minutes },
    ColumnSpec { header: "Mes/Año", width: 15.0, style: Style::Center },
];

const PEOPLE_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec { header: "Persona", width: 35.0, style: Style::Left },
    ColumnSpec { header: "Mes/Año", width: 15.0, style: Style::Center },
    ColumnSpec { header: "Tiempo Total (minutos)", width: 20.0, style: Style::Minutes },
];

const TICKET_COLUMNS: [ColumnSpec; 5] = [
    ColumnSpec { header: "Servicio", width: 35.0, style: Style::Left },
    ColumnSpec { header: "N° Tiquet", width: 25.0, style: Style::Center },
    ColumnSpec { header: "Descripción", width: 50.0, style: Style::Left },
    ColumnSpec { header: "Mes/Año", width: 15.0, style: Style::Center },
    ColumnSpec { header: "Minutos Dedicados", width: 20.0, style: Style::Minutes },
];

enum Value<'a> {
    Text(&'a str),
    Number(f64),
}

/// Ticket numbers are written as numbers when the text is exactly an integer;
/// ids such as `007` keep their leading zeros as text.
fn ticket_value(ticket: &str) -> Value<'_> {
    let trimmed = ticket.trim();
    match trimmed.parse::<i64>() {
        Ok(number) if number.to_string() == trimmed => Value::Number(number as f64),
        _ => Value::Text(ticket),
    }
}

struct Formats {
    header: Format,
    left: Format,
    center: Format,
    minutes: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_BACKGROUND))
                .set_font_color(Color::White)
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center),
            left: Format::new().set_align(FormatAlign::Left),
            center: Format::new().set_align(FormatAlign::Center),
            minutes: Format::new()
                .set_num_format(MINUTES_FORMAT)
                .set_align(FormatAlign::Center),
        }
    }

    fn for_style(&self, style: Style) -> &Format {
        match style {
            Style::Left => &self.left,
            Style::Center => &self.center,
            Style::Minutes => &self.minutes,
        }
    }
}

/// Lays the three report views out as named worksheets.
pub fn render(data: &ReportData) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    let rows = data.services.iter().map(|row| {
        vec![
            Value::Text(&row.servicio),
            Value::Number(row.tiempo_total as f64),
            Value::Text(&row.mes),
        ]
    });
    write_sheet(workbook.add_worksheet(), SERVICES_SHEET, &SERVICE_COLUMNS, rows, &formats)?;

    let rows = data.people.iter().map(|row| {
        vec![
            Value::Text(row.persona.as_deref().unwrap_or_default()),
            Value::Text(&row.mes),
            Value::Number(row.tiempo_total as f64),
        ]
    });
    write_sheet(workbook.add_worksheet(), PEOPLE_SHEET, &PEOPLE_COLUMNS, rows, &formats)?;

    let rows = data.tickets.iter().map(|row| {
        vec![
            Value::Text(&row.servicio),
            ticket_value(&row.tiquet),
            Value::Text(row.asunto.as_deref().unwrap_or_default()),
            Value::Text(&row.mes),
            Value::Number(row.minutos as f64),
        ]
    });
    write_sheet(workbook.add_worksheet(), TICKETS_SHEET, &TICKET_COLUMNS, rows, &formats)?;

    Ok(workbook)
}

fn write_sheet<'a>(
    sheet: &mut Worksheet,
    name: &str,
    columns: &[ColumnSpec],
    rows: impl Iterator<Item = Vec<Value<'a>>>,
    formats: &Formats,
) -> Result<(), XlsxError> {
    sheet.set_name(name)?;

    for (idx, column) in columns.iter().enumerate() {
        let col = idx as u16;
        sheet.set_column_width(col, column.width)?;
        sheet.set_column_format(col, formats.for_style(column.style))?;
        sheet.write_string_with_format(0, col, column.header, &formats.header)?;
    }

    for (row_idx, values) in rows.enumerate() {
        let row = row_idx as u32 + 1;
        for (idx, (value, column)) in values.iter().zip(columns).enumerate() {
            let col = idx as u16;
            let format = formats.for_style(column.style);
            match value {
                Value::Text(text) if text.is_empty() => {}
                Value::Text(text) => {
                    sheet.write_string_with_format(row, col, *text, format)?;
                }
                Value::Number(number) => {
                    sheet.write_number_with_format(row, col, *number, format)?;
                }
            }
        }
    }

    Ok(())
}
