mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oples_core::pipeline::{self, Uploads};
use oples_core::{db, load, merge, report, DbConfig, LoadOptions, PostgresStore, ReportConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "OPLES service log consolidation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge the uploads, load new entries and regenerate the report
    Run(RunArgs),
    /// Merge the uploads and load new entries without touching the report
    Load(UploadArgs),
    /// Regenerate the consolidated report from the stored service log
    Report(ReportArgs),
    /// Create the service log table if it does not exist
    InitDb,
    /// Serve the upload endpoint
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Tickets export (.xlsx)
    #[arg(long)]
    tickets: PathBuf,
    /// Ticket detail export (.xlsx)
    #[arg(long)]
    detail: PathBuf,
    /// Compute the load summary without inserting anything
    #[arg(long)]
    dry_run: bool,
}

impl UploadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions {
            dry_run: self.dry_run,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    uploads: UploadArgs,
    /// Where to write the report (defaults to OPLES_REPORT_PATH or informe_consolidado.xlsx)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let uploads = read_uploads(&args.uploads)?;
            let store = connect_store().await?;
            let outcome = pipeline::run(
                &store,
                &uploads,
                &report_config(args.output),
                args.uploads.options(),
            )
            .await;
            store.pool().close().await;
            print_json(&outcome?)
        }
        Command::Load(args) => {
            let uploads = read_uploads(&args)?;
            let records = merge(&uploads.tickets, &uploads.detail)?;
            let store = connect_store().await?;
            let summary = load(&store, &records, args.options()).await;
            store.pool().close().await;
            print_json(&summary?)
        }
        Command::Report(args) => {
            let store = connect_store().await?;
            let written = report(&store, &report_config(args.output)).await;
            store.pool().close().await;
            let path = written.context("failed to regenerate the report")?;
            info!(path = %path.display(), "report regenerated");
            Ok(())
        }
        Command::InitDb => {
            let store = connect_store().await?;
            db::ensure_schema(store.pool())
                .await
                .context("failed to create the service log table")?;
            info!(table = db::SERVICE_LOG_TABLE, "service log table ready");
            Ok(())
        }
        Command::Serve(args) => {
            let store = connect_store().await?;
            let state = server::AppState::new(Arc::new(store), ReportConfig::from_env());
            server::serve(state, args.bind).await
        }
    }
}

fn read_uploads(args: &UploadArgs) -> Result<Uploads> {
    Uploads::from_paths(&args.tickets, &args.detail).with_context(|| {
        format!(
            "failed to read uploads {} and {}",
            args.tickets.display(),
            args.detail.display()
        )
    })
}

async fn connect_store() -> Result<PostgresStore> {
    let config = DbConfig::from_env().context("database configuration is incomplete")?;
    let pool = db::connect(&config)
        .await
        .context("failed to connect to the service log database")?;
    Ok(PostgresStore::new(pool))
}

fn report_config(output: Option<PathBuf>) -> ReportConfig {
    output
        .map(ReportConfig::new)
        .unwrap_or_else(ReportConfig::from_env)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
