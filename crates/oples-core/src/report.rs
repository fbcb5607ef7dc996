use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::month::Month;
use crate::store::ServiceLogStore;
use crate::types::ServiceEntry;
use crate::workbook;

/// Minutes per service and month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTotal {
    pub servicio: String,
    pub tiempo_total: i64,
    pub mes: String,
}

/// Minutes per person and month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonTotal {
    pub persona: Option<String>,
    pub tiempo_total: i64,
    pub mes: String,
}

/// Minutes per ticket subject and month, with repeated log entries collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDetail {
    pub servicio: String,
    pub tiquet: String,
    pub asunto: Option<String>,
    pub mes: String,
    pub minutos: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportData {
    pub services: Vec<ServiceTotal>,
    pub people: Vec<PersonTotal>,
    pub tickets: Vec<TicketDetail>,
}

/// Builds the consolidated workbook from everything in the store and writes
/// it to the configured path, replacing any earlier report.
pub async fn report<S>(store: &S, config: &ReportConfig) -> Result<PathBuf, ReportError>
where
    S: ServiceLogStore + ?Sized,
{
    let entries = store.fetch_entries().await?;
    let data = ReportData::from_entries(&entries)?;

    let mut book = workbook::render(&data)?;
    book.save(&config.output_path)?;

    info!(
        path = %config.output_path.display(),
        services = data.services.len(),
        people = data.people.len(),
        tickets = data.tickets.len(),
        "consolidated report written"
    );

    Ok(config.output_path.clone())
}

impl ReportData {
    pub fn from_entries(entries: &[ServiceEntry]) -> Result<Self, ReportError> {
        let frame = entries_frame(entries)?;
        Ok(Self {
            services: service_totals(&frame)?,
            people: person_totals(&frame)?,
            tickets: ticket_details(&frame)?,
        })
    }
}

/// One row per stored entry, plus `mes_orden`, a chronological sort key for
/// the `MM/YYYY` month.
fn entries_frame(entries: &[ServiceEntry]) -> Result<DataFrame, ReportError> {
    let mut servicio = Vec::with_capacity(entries.len());
    let mut tiquet = Vec::with_capacity(entries.len());
    let mut asunto = Vec::with_capacity(entries.len());
    let mut persona = Vec::with_capacity(entries.len());
    let mut mes = Vec::with_capacity(entries.len());
    let mut mes_orden = Vec::with_capacity(entries.len());
    let mut minutos = Vec::with_capacity(entries.len());

    for entry in entries {
        let month =
            Month::parse(&entry.fecha).ok_or_else(|| ReportError::InvalidMonth(entry.fecha.clone()))?;
        servicio.push(entry.servicios.clone());
        tiquet.push(entry.ticket_id.clone());
        asunto.push(entry.asunto.clone());
        persona.push(entry.responsable.clone());
        mes.push(entry.fecha.clone());
        mes_orden.push(month.ordinal());
        minutos.push(i64::from(entry.tiempo_trabajado));
    }

    let frame = df![
        "servicio" => servicio,
        "tiquet" => tiquet,
        "asunto" => asunto,
        "persona" => persona,
        "mes" => mes,
        "mes_orden" => mes_orden,
        "minutos" => minutos,
    ]?;
    Ok(frame)
}

/// Sums minutes over `label` and month; newest month first, then largest
/// total, then label.
fn totals_by(frame: &DataFrame, label: &str) -> PolarsResult<DataFrame> {
    frame
        .clone()
        .lazy()
        .group_by([col(label), col("mes"), col("mes_orden")])
        .agg([col("minutos").sum().alias("tiempo_total")])
        .sort_by_exprs(
            [col("mes_orden"), col("tiempo_total"), col(label)],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, true, false])
                .with_maintain_order(true),
        )
        .collect()
}

fn service_totals(frame: &DataFrame) -> Result<Vec<ServiceTotal>, ReportError> {
    let totals = totals_by(frame, "servicio")?;
    let servicio = totals.column("servicio")?.str()?;
    let mes = totals.column("mes")?.str()?;
    let tiempo = totals.column("tiempo_total")?.i64()?;

    Ok((0..totals.height())
        .map(|idx| ServiceTotal {
            servicio: servicio.get(idx).unwrap_or_default().to_string(),
            tiempo_total: tiempo.get(idx).unwrap_or(0),
            mes: mes.get(idx).unwrap_or_default().to_string(),
        })
        .collect())
}

fn person_totals(frame: &DataFrame) -> Result<Vec<PersonTotal>, ReportError> {
    let totals = totals_by(frame, "persona")?;
    let persona = totals.column("persona")?.str()?;
    let mes = totals.column("mes")?.str()?;
    let tiempo = totals.column("tiempo_total")?.i64()?;

    Ok((0..totals.height())
        .map(|idx| PersonTotal {
            persona: persona.get(idx).map(str::to_string),
            tiempo_total: tiempo.get(idx).unwrap_or(0),
            mes: mes.get(idx).unwrap_or_default().to_string(),
        })
        .collect())
}

/// Collapses entries sharing service, ticket, subject and month; newest month
/// first, then service, subject and ticket ascending.
fn ticket_details(frame: &DataFrame) -> Result<Vec<TicketDetail>, ReportError> {
    let grouped = frame
        .clone()
        .lazy()
        .group_by([
            col("servicio"),
            col("tiquet"),
            col("asunto"),
            col("mes"),
            col("mes_orden"),
        ])
        .agg([col("minutos").sum().alias("minutos")])
        .sort_by_exprs(
            [
                col("mes_orden"),
                col("servicio"),
                col("asunto"),
                col("tiquet"),
            ],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false, false, false])
                .with_maintain_order(true),
        )
        .collect()?;

    let servicio = grouped.column("servicio")?.str()?;
    let tiquet = grouped.column("tiquet")?.str()?;
    let asunto = grouped.column("asunto")?.str()?;
    let mes = grouped.column("mes")?.str()?;
    let minutos = grouped.column("minutos")?.i64()?;

    Ok((0..grouped.height())
        .map(|idx| TicketDetail {
            servicio: servicio.get(idx).unwrap_or_default().to_string(),
            tiquet: tiquet.get(idx).unwrap_or_default().to_string(),
            asunto: asunto.get(idx).map(str::to_string),
            mes: mes.get(idx).unwrap_or_default().to_string(),
            minutos: minutos.get(idx).unwrap_or(0),
        })
        .collect())
}
