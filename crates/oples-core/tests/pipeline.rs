use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use oples_core::loader::LoadOptions;
use oples_core::pipeline::{self, Uploads};
use oples_core::{
    load, merge, InputError, MemoryStore, PipelineError, ReportConfig, ServiceEntry,
    ServiceLogStore, StorageError,
};
use oples_sheets::Cell;
use rust_xlsxwriter::Workbook;

enum Value {
    Text(&'static str),
    Number(f64),
}

fn write_xlsx(path: &Path, headers: &[&str], rows: &[Vec<Value>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).expect("header");
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            let (row, col) = (row_idx as u32 + 1, col as u16);
            match value {
                Value::Text(text) => sheet.write_string(row, col, *text).map(|_| ()),
                Value::Number(number) => sheet.write_number(row, col, *number).map(|_| ()),
            }
            .expect("cell");
        }
    }
    workbook.save(path).expect("save fixture");
}

const TICKET_HEADERS: [&str; 6] = [
    "id",
    "Servei/Projecte - OPLES",
    "Assumpte",
    "Time Taken",
    "Creat per",
    "Creat",
];

const DETAIL_HEADERS: [&str; 3] = ["Ticket", "ID", "Contingut"];

struct Fixture {
    _dir: tempfile::TempDir,
    tickets: PathBuf,
    detail: PathBuf,
    report: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let tickets = dir.path().join("Tiquets.xlsx");
    let detail = dir.path().join("Detalle.xlsx");
    let report = dir.path().join("informe_consolidado.xlsx");

    write_xlsx(
        &tickets,
        &TICKET_HEADERS,
        &[
            vec![
                Value::Number(1.0),
                Value::Text("Support"),
                Value::Text("Printer jam"),
                Value::Text("30"),
                Value::Text("Anna"),
                Value::Text("2024-01-10 09:00:00"),
            ],
            vec![
                Value::Number(2.0),
                Value::Text("Support"),
                Value::Text("Mailbox full"),
                Value::Number(45.0),
                Value::Text("Joan"),
                Value::Text("2024-01-22"),
            ],
            vec![
                Value::Number(3.0),
                Value::Text("Infra"),
                Value::Text("Backup"),
                Value::Text("abc"),
                Value::Text("Anna"),
                Value::Text("sometime"),
            ],
            vec![
                Value::Number(4.0),
                Value::Text("Infra"),
                Value::Text("Unmatched"),
                Value::Number(10.0),
                Value::Text("Anna"),
                Value::Text("2024-02-01"),
            ],
        ],
    );

    write_xlsx(
        &detail,
        &DETAIL_HEADERS,
        &[
            vec![Value::Number(1.0), Value::Number(500.0), Value::Text("Replaced roller")],
            vec![Value::Number(2.0), Value::Number(501.0), Value::Text("Archived mail")],
            vec![Value::Number(3.0), Value::Number(502.0), Value::Text("Checked logs")],
            vec![Value::Number(9.0), Value::Number(599.0), Value::Text("No ticket")],
        ],
    );

    Fixture {
        _dir: dir,
        tickets,
        detail,
        report,
    }
}

#[test]
fn merge_matches_shared_ticket_ids() {
    let fixture = fixture();
    let uploads = Uploads::from_paths(&fixture.tickets, &fixture.detail).expect("uploads");

    let records = merge(&uploads.tickets, &uploads.detail).expect("merge");

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].c_id, Cell::Float(500.0));
    assert_eq!(records[0].id, Cell::Float(1.0));
    assert_eq!(records[0].descripcion, Cell::Text("Replaced roller".into()));
}

#[tokio::test]
async fn single_record_is_loaded_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tickets = dir.path().join("t.xlsx");
    let detail = dir.path().join("d.xlsx");
    write_xlsx(
        &tickets,
        &TICKET_HEADERS,
        &[vec![
            Value::Number(1.0),
            Value::Text("Support"),
            Value::Text("Printer"),
            Value::Text("45"),
            Value::Text("Anna"),
            Value::Text("2024-03-15 10:30:00"),
        ]],
    );
    write_xlsx(
        &detail,
        &DETAIL_HEADERS,
        &[vec![Value::Number(1.0), Value::Number(500.0), Value::Text("Done")]],
    );

    let uploads = Uploads::from_paths(&tickets, &detail).expect("uploads");
    let records = merge(&uploads.tickets, &uploads.detail).expect("merge");
    assert_eq!(records.len(), 1);

    let store = MemoryStore::new();
    let first = load(&store, &records, LoadOptions::default()).await.expect("first load");
    assert_eq!(first.inserted_count, 1);
    assert_eq!(first.monthly_distribution.len(), 1);
    assert_eq!(first.monthly_distribution[0].month, "03/2024");

    let second = load(&store, &records, LoadOptions::default()).await.expect("second load");
    assert_eq!(second.inserted_count, 0);
    assert_eq!(second.already_persisted, 1);
    assert!(second.monthly_distribution.is_empty());

    let stored = store.fetch_entries().await.expect("entries");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].c_id, 500);
    assert_eq!(stored[0].ticket_id, "1");
    assert_eq!(stored[0].tiempo_trabajado, 45);
    assert_eq!(stored[0].fecha, "03/2024");
    assert_eq!(stored[0].descripcion.as_deref(), Some("Done"));
}

#[tokio::test]
async fn duplicate_ids_in_one_batch_keep_first() {
    let fixture = fixture();
    let uploads = Uploads::from_paths(&fixture.tickets, &fixture.detail).expect("uploads");
    let mut records = merge(&uploads.tickets, &uploads.detail).expect("merge");
    let mut duplicate = records[1].clone();
    duplicate.c_id = records[0].c_id.clone();
    records.push(duplicate);

    let store = MemoryStore::new();
    let summary = load(&store, &records, LoadOptions::default()).await.expect("load");

    assert_eq!(summary.batch_duplicates, 1);
    let stored = store.fetch_entries().await.expect("entries");
    let first = stored.iter().find(|entry| entry.c_id == 500).expect("500");
    assert_eq!(first.asunto.as_deref(), Some("Printer jam"));
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let fixture = fixture();
    let uploads = Uploads::from_paths(&fixture.tickets, &fixture.detail).expect("uploads");
    let records = merge(&uploads.tickets, &uploads.detail).expect("merge");

    let store = MemoryStore::new();
    let summary = load(&store, &records, LoadOptions { dry_run: true })
        .await
        .expect("load");

    assert!(summary.dry_run);
    assert_eq!(summary.inserted_count, 0);
    assert_eq!(summary.monthly_distribution[0].count, 2);
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn pipeline_loads_and_writes_report() {
    let fixture = fixture();
    let uploads = Uploads::from_paths(&fixture.tickets, &fixture.detail).expect("uploads");
    let store = MemoryStore::new();

    let outcome = pipeline::run(
        &store,
        &uploads,
        &ReportConfig::new(&fixture.report),
        LoadOptions::default(),
    )
    .await
    .expect("pipeline");

    // Ticket 3 has an unparseable date and ticket 4 has no detail row.
    assert_eq!(outcome.load.received, 3);
    assert_eq!(outcome.load.inserted_count, 2);
    assert_eq!(outcome.load.invalid, 1);
    assert_eq!(outcome.report_path, fixture.report);

    let mut workbook: Xlsx<_> = calamine::open_workbook(&fixture.report).expect("open report");
    let resumen = workbook.worksheet_range("Resumen").expect("Resumen");
    assert_eq!(resumen.get_value((1, 0)), Some(&Data::String("Support".into())));
    assert_eq!(resumen.get_value((1, 1)), Some(&Data::Float(75.0)));
    assert_eq!(resumen.get_value((1, 2)), Some(&Data::String("01/2024".into())));

    let detalle = workbook.worksheet_range("Detalle Tiquets").expect("Detalle");
    assert_eq!(detalle.height(), 3);
}

#[tokio::test]
async fn rerunning_pipeline_is_idempotent() {
    let fixture = fixture();
    let uploads = Uploads::from_paths(&fixture.tickets, &fixture.detail).expect("uploads");
    let store = MemoryStore::new();
    let config = ReportConfig::new(&fixture.report);

    pipeline::run(&store, &uploads, &config, LoadOptions::default())
        .await
        .expect("first run");
    let second = pipeline::run(&store, &uploads, &config, LoadOptions::default())
        .await
        .expect("second run");

    assert_eq!(second.load.inserted_count, 0);
    assert_eq!(store.snapshot().await.len(), 2);
}

#[tokio::test]
async fn input_errors_stop_before_storage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tickets = dir.path().join("t.xlsx");
    let detail = dir.path().join("d.xlsx");
    write_xlsx(&tickets, &TICKET_HEADERS, &[]);
    write_xlsx(&detail, &["Tiquet", "ID", "Contingut"], &[]);

    let uploads = Uploads::from_paths(&tickets, &detail).expect("uploads");
    let store = MemoryStore::new();
    let err = pipeline::run(
        &store,
        &uploads,
        &ReportConfig::new(dir.path().join("out.xlsx")),
        LoadOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Input(InputError::MissingColumn { column: "Ticket", .. })
    ));
    assert!(!dir.path().join("out.xlsx").exists());
}

/// Reads succeed, inserts fail as if the connection dropped mid-batch.
struct BrokenWriteStore {
    inner: MemoryStore,
}

#[async_trait]
impl ServiceLogStore for BrokenWriteStore {
    async fn existing_ids(&self) -> Result<HashSet<i64>, StorageError> {
        self.inner.existing_ids().await
    }

    async fn insert_entries(&self, _entries: &[ServiceEntry]) -> Result<(), StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn fetch_entries(&self) -> Result<Vec<ServiceEntry>, StorageError> {
        self.inner.fetch_entries().await
    }
}

#[tokio::test]
async fn storage_failure_aborts_before_report() {
    let fixture = fixture();
    let uploads = Uploads::from_paths(&fixture.tickets, &fixture.detail).expect("uploads");
    let store = BrokenWriteStore {
        inner: MemoryStore::new(),
    };

    let err = pipeline::run(
        &store,
        &uploads,
        &ReportConfig::new(&fixture.report),
        LoadOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Storage(StorageError::Database(sqlx::Error::PoolTimedOut))
    ));
    assert!(store.inner.snapshot().await.is_empty());
    assert!(!fixture.report.exists());
}
