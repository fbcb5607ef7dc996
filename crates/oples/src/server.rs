use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use oples_core::config::DEFAULT_REPORT_PATH;
use oples_core::pipeline::{self, Uploads};
use oples_core::{LoadOptions, PipelineError, ReportConfig, ServiceLogStore};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const TICKETS_FIELD: &str = "tiquets";
const DETAIL_FIELD: &str = "detalle";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const UPLOAD_LIMIT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ServiceLogStore>,
    report: Arc<ReportConfig>,
    /// One pipeline run at a time; the report path is shared.
    runs: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ServiceLogStore>, report: ReportConfig) -> Self {
        Self {
            store,
            report: Arc::new(report),
            runs: Arc::new(Mutex::new(())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/informe", post(informe))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Input(err) => {
                warn!("rejected upload: {err}");
                ApiError::BadRequest(err.to_string())
            }
            other => {
                error!("pipeline failed: {other}");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Accepts the two exports as multipart fields and answers with the
/// regenerated workbook.
async fn informe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut tickets = None;
    let mut detail = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("malformed upload: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let slot = match name.as_str() {
            TICKETS_FIELD => &mut tickets,
            DETAIL_FIELD => &mut detail,
            _ => {
                debug!(field = %name, "ignoring unexpected upload field");
                continue;
            }
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(format!("failed to read '{name}': {err}")))?;
        *slot = Some(bytes);
    }

    let tickets = tickets
        .ok_or_else(|| ApiError::BadRequest(format!("missing '{TICKETS_FIELD}' upload")))?;
    let detail =
        detail.ok_or_else(|| ApiError::BadRequest(format!("missing '{DETAIL_FIELD}' upload")))?;

    let uploads = Uploads::from_bytes(&tickets, &detail).map_err(PipelineError::from)?;

    let guard = state.runs.lock().await;
    let outcome = pipeline::run(
        state.store.as_ref(),
        &uploads,
        &state.report,
        LoadOptions::default(),
    )
    .await?;
    let workbook = tokio::fs::read(&outcome.report_path)
        .await
        .map_err(|err| {
            error!("failed to read written report: {err}");
            ApiError::Internal(format!("failed to read report: {err}"))
        })?;
    drop(guard);

    let filename = outcome
        .report_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_REPORT_PATH);

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        workbook,
    )
        .into_response())
}
