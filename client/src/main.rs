use clap::{Parser, Subcommand, ValueEnum};
use client::{ClientError, UploadOutcome, Uploader};
use common::cancel::CancelHandle;
use common::model::column::ColumnDescriptor;
use common::model::event::ProgressEvent;
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "client",
    version,
    about = "Upload product listings for enrichment and export the results"
)]
struct Cli {
    /// Base URL of the enrichment server.
    #[arg(long, env = "ENRICHER_URL", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a CSV or spreadsheet and follow its enrichment.
    Upload(UploadArgs),
}

#[derive(Parser)]
struct UploadArgs {
    /// The listing to upload (.csv, .xlsx or .xls).
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// JSON column descriptors; switches the run to dynamic mode.
    #[arg(long, value_name = "JSON")]
    columns: Option<String>,

    /// Export the enriched records to this path.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Export file format.
    #[arg(long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Comma separated field names to export, in order.
    #[arg(long, value_name = "FIELDS")]
    fields: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Xlsx,
}

impl FormatArg {
    fn as_str(self) -> &'static str {
        match self {
            FormatArg::Csv => "csv",
            FormatArg::Xlsx => "xlsx",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Upload(args) => upload(&cli.server, args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn upload(server: &str, args: UploadArgs) -> Result<(), ClientError> {
    let columns: Vec<ColumnDescriptor> = match &args.columns {
        Some(json) => serde_json::from_str(json)?,
        None => Vec::new(),
    };
    let is_dynamic = args.columns.is_some();

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let mut uploader = Uploader::new(server);
    let outcome = uploader
        .upload(&args.file, columns, is_dynamic, &cancel, |event| {
            log_event(event, is_dynamic)
        })
        .await?;

    match outcome {
        UploadOutcome::Completed(summary) => info!(
            "done: {} records, {} rows skipped",
            summary.emitted, summary.skipped
        ),
        UploadOutcome::Cancelled => warn!(
            "cancelled with {} records received",
            uploader.session().records().len()
        ),
        UploadOutcome::Interrupted => warn!(
            "stream ended early at {}%",
            uploader.session().progress()
        ),
    }

    let Some(out) = args.out else {
        return Ok(());
    };
    let records = uploader.session().records();
    if records.is_empty() {
        warn!("nothing to export");
        return Ok(());
    }
    let fields: Option<Vec<String>> = args.fields.as_deref().map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    });
    uploader
        .download(records, args.format.as_str(), fields.as_deref(), &out)
        .await?;
    Ok(())
}

fn log_event(event: &ProgressEvent, is_dynamic: bool) {
    let ProgressEvent::Record { progress, product } = event else {
        return;
    };
    if is_dynamic {
        info!("[{:>3}%] {}", progress, product.id);
        return;
    }
    match product.to_product() {
        Ok(listing) => info!(
            "[{:>3}%] {} | {} | {}",
            progress,
            listing.title.as_deref().unwrap_or("-"),
            listing.category.as_deref().unwrap_or("-"),
            listing.price.as_deref().unwrap_or("-")
        ),
        Err(e) => warn!("[{:>3}%] {}: unexpected product shape: {}", progress, product.id, e),
    }
}
