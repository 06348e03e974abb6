//! CLI entry point for the sales ETL pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use sales_etl::config::{DEFAULT_WORKSHEET, PublishTarget};
use sales_etl::pipeline::DeferredPublish;
use sales_etl::{
    EtlConfig, EtlError, IngestStage, Pipeline, PipelineRun, RunReport, TransformStage,
    write_report_to_file,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Exit code for a failed stage.
const EXIT_STAGE_FAILED: u8 = 1;
/// Exit code for invalid configuration.
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Batch sales ETL: ingest a CSV, clean and enrich it, publish it to a spreadsheet",
    long_about = "Batch sales ETL: ingest a CSV, clean and enrich it, publish it to a spreadsheet.\n\n\
                  Every option can also be set through a SALES_ETL_* environment variable;\n\
                  a .env file in the working directory is loaded first.\n\n\
                  EXAMPLES:\n  \
                  # Full run with defaults\n  \
                  sales-etl run\n\n  \
                  # Re-run only the Transform stage\n  \
                  sales-etl --store-root warehouse transform\n\n  \
                  # Publish to Google Sheets and print a JSON report\n  \
                  sales-etl --spreadsheet-id 1AbC --credentials creds.json --json publish"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: ConfigArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print the run report as JSON to stdout instead of logging
    #[arg(long, global = true)]
    json: bool,

    /// Write pipeline_report.json to the report directory
    #[arg(short = 'r', long, global = true)]
    emit_report: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run Ingest, Transform and Publish in order (default)
    Run,
    /// Load the source CSV into the raw table
    Ingest,
    /// Clean and enrich the raw table into the production table
    Transform,
    /// Push the production table to the spreadsheet
    Publish,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// CSV file read by Ingest
    #[arg(long, env = "SALES_ETL_SOURCE", global = true)]
    source: Option<PathBuf>,

    /// Root directory of the table store
    #[arg(long, env = "SALES_ETL_STORE_ROOT", global = true)]
    store_root: Option<PathBuf>,

    /// Raw table, as namespace.table or table
    #[arg(long, env = "SALES_ETL_RAW_TABLE", global = true)]
    raw_table: Option<String>,

    /// Production table, as namespace.table or table
    #[arg(long, env = "SALES_ETL_DESTINATION", global = true)]
    destination: Option<String>,

    /// CSV file Publish writes when no spreadsheet id is given
    #[arg(long, env = "SALES_ETL_SHEET_PATH", global = true)]
    sheet_path: Option<PathBuf>,

    /// Google spreadsheet id; switches Publish to Google Sheets
    #[arg(long, env = "SALES_ETL_SPREADSHEET_ID", global = true)]
    spreadsheet_id: Option<String>,

    /// Worksheet (range) written in the Google spreadsheet
    #[arg(long, env = "SALES_ETL_WORKSHEET", default_value = DEFAULT_WORKSHEET, global = true)]
    worksheet: String,

    /// JSON credential file holding an access_token
    #[arg(long, env = "SALES_ETL_CREDENTIALS", default_value = "credentials.json", global = true)]
    credentials: PathBuf,

    /// Publish at most this many rows
    #[arg(long, env = "SALES_ETL_ROW_LIMIT", global = true)]
    row_limit: Option<usize>,

    /// Directory for pipeline_report.json
    #[arg(long, env = "SALES_ETL_REPORT_DIR", default_value = ".", global = true)]
    report_dir: PathBuf,
}

impl ConfigArgs {
    fn to_config(&self) -> Result<EtlConfig, EtlError> {
        let mut builder = EtlConfig::builder().report_dir(&self.report_dir);

        if let Some(source) = &self.source {
            builder = builder.source_location(source);
        }
        if let Some(root) = &self.store_root {
            builder = builder.store_root(root);
        }
        if let Some(raw_table) = &self.raw_table {
            builder = builder.raw_table(raw_table);
        }
        if let Some(destination) = &self.destination {
            builder = builder.destination(destination);
        }
        if let Some(limit) = self.row_limit {
            builder = builder.publish_row_limit(limit);
        }

        if let Some(spreadsheet_id) = &self.spreadsheet_id {
            builder = builder.publish_target(PublishTarget::GoogleSheet {
                spreadsheet_id: spreadsheet_id.clone(),
                worksheet: self.worksheet.clone(),
                credentials_path: self.credentials.clone(),
            });
        } else if let Some(path) = &self.sheet_path {
            builder = builder.publish_target(PublishTarget::Csv { path: path.clone() });
        }

        Ok(builder.build()?)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_pipeline(command: Command, config: &EtlConfig) -> Result<Pipeline> {
    let builder = Pipeline::builder();
    let builder = match command {
        Command::Run => builder.config(config.clone()),
        Command::Ingest => builder.stage(Box::new(IngestStage::from_config(config))),
        Command::Transform => builder.stage(Box::new(TransformStage::from_config(config))),
        Command::Publish => builder.stage(Box::new(DeferredPublish::new(config.clone()))),
    };
    Ok(builder.build()?)
}

fn report_run(cli: &Cli, config: &EtlConfig, run: &PipelineRun) -> Result<()> {
    let report = RunReport::from_run(config, run);

    if cli.emit_report {
        let dir = config.report_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let path = write_report_to_file(&report, &dir)
            .with_context(|| format!("Failed to write report to {}", dir.display()))?;
        info!("Run report written to {}", path.display());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn try_main(cli: &Cli) -> Result<bool> {
    let config = cli.options.to_config()?;
    let command = cli.command.unwrap_or(Command::Run);

    let pipeline = build_pipeline(command, &config)?;
    let run = pipeline.run();

    report_run(cli, &config, &run)?;
    Ok(run.is_success())
}

fn main() -> ExitCode {
    // .env must be loaded before parsing so SALES_ETL_* values reach clap
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    match try_main(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_STAGE_FAILED),
        Err(e) => {
            let config_error = e
                .downcast_ref::<EtlError>()
                .is_some_and(EtlError::is_config_error);
            error!("{:#}", e);
            if cli.json {
                eprintln!("Error: {:#}", e);
            }
            if config_error {
                ExitCode::from(EXIT_CONFIG_ERROR)
            } else {
                ExitCode::from(EXIT_STAGE_FAILED)
            }
        }
    }
}
