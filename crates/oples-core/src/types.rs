use oples_sheets::Cell;
use serde::{Deserialize, Serialize};

/// One row of the inner join between the tickets and detail uploads, with
/// values still in their raw spreadsheet form.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRecord {
    pub c_id: Cell,
    pub id: Cell,
    pub servicios: Cell,
    pub asunto: Cell,
    pub tiempo_trabajado: Cell,
    pub responsable: Cell,
    pub fecha: Cell,
    pub descripcion: Cell,
}

/// A cleaned service-log row as stored in `servicios_registro`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceEntry {
    pub c_id: i64,
    #[sqlx(rename = "id")]
    pub ticket_id: String,
    pub servicios: String,
    pub asunto: Option<String>,
    pub tiempo_trabajado: i32,
    pub responsable: Option<String>,
    /// Month of creation as `MM/YYYY`.
    pub fecha: String,
    pub descripcion: Option<String>,
}
