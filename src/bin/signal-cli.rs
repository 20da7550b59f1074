use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;

use price_signal_back_end::action_router::{ActionRouterInput, ActionRouterOutput};
use price_signal_back_end::cli_utils::{
    format_decimal, format_json, format_signal, format_table, format_ts, print_error, print_header,
    print_info, print_success, print_warning,
};
use price_signal_back_end::ingest::decode::{Base64Decoder, EncodedPayload, PayloadDecoder, PlainDecoder};
use price_signal_back_end::ingest::models::{BatchReport, EventOutcome};
use price_signal_back_end::ingest::processor_enums::{
    GetWindowInputArgs, IngestProcessorInput, IngestProcessorOutput, RangeInputArgs, WindowSnapshot,
};
use price_signal_back_end::utils::app_config::{AppConfig, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "signal-cli",
    about = "Bucketed price aggregation and signal tool",
    long_about = "Creates storage tables, replays price payloads through the ingest pipeline and inspects windows"
)]
struct CliArgs {
    #[command(flatten)]
    settings: Settings,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the raw and aggregate tables if missing
    InitTables,
    /// Replay a file holding one JSON price payload per line
    Ingest {
        file: std::path::PathBuf,
        /// Lines are base64 encoded, as delivered by the stream
        #[arg(long)]
        base64: bool,
    },
    /// Trailing window statistic and signal for an asset
    Window {
        asset_id: String,
        /// Epoch seconds, defaults to now
        #[arg(long)]
        now: Option<i64>,
    },
    /// Bucket aggregates for an asset
    Buckets {
        asset_id: String,
        #[arg(long)]
        from: Option<i64>,
        #[arg(long)]
        to: Option<i64>,
    },
    /// Raw events for an asset
    Raw {
        asset_id: String,
        #[arg(long)]
        from: Option<i64>,
        #[arg(long)]
        to: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()).as_str())
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let decoder: Arc<dyn PayloadDecoder> = match &args.command {
        Command::Ingest { base64: true, .. } => Arc::new(Base64Decoder),
        _ => Arc::new(PlainDecoder),
    };

    let app_config = match AppConfig::from_settings(&args.settings, decoder) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("Failed to initialize: {}", e));
            return Err(e);
        }
    };

    if !app_config.durable {
        print_warning("DATABASE_URL not set, results only live for this invocation");
    }

    match args.command {
        Command::InitTables => init_tables(&app_config),
        Command::Ingest { file, .. } => ingest_file(&app_config, &file, args.json).await,
        Command::Window { asset_id, now } => show_window(&app_config, asset_id, now, args.json).await,
        Command::Buckets { asset_id, from, to } => {
            let range = resolve_range(&app_config, asset_id, from, to)?;
            show_buckets(&app_config, range, args.json).await
        }
        Command::Raw { asset_id, from, to } => {
            let range = resolve_range(&app_config, asset_id, from, to)?;
            show_raw(&app_config, range, args.json).await
        }
    }
}

fn init_tables(app_config: &AppConfig) -> Result<()> {
    // AppConfig already ran the idempotent CREATE statements on connect
    if app_config.durable {
        print_success("Raw and aggregate tables are in place");
        Ok(())
    } else {
        Err(anyhow!("init-tables needs DATABASE_URL"))
    }
}

fn resolve_range(app_config: &AppConfig, asset_id: String, from: Option<i64>, to: Option<i64>) -> Result<RangeInputArgs> {
    let to = to.unwrap_or_else(|| app_config.pipeline.now());
    let from = from.unwrap_or_else(|| to.saturating_sub(app_config.aggregators().window_seconds()));
    if from > to {
        return Err(anyhow!("--from must not be after --to"));
    }
    Ok(RangeInputArgs { asset_id, from, to })
}

async fn call(app_config: &AppConfig, input: IngestProcessorInput) -> Result<IngestProcessorOutput> {
    match ActionRouterInput::Ingest(input).process(app_config.clone()).await? {
        ActionRouterOutput::Ingest(output) => Ok(output),
    }
}

async fn ingest_file(app_config: &AppConfig, file: &std::path::Path, json: bool) -> Result<()> {
    let contents = tokio::fs::read_to_string(file).await?;
    let payloads: Vec<EncodedPayload> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(EncodedPayload::new)
        .collect();

    if payloads.is_empty() {
        print_info("Nothing to ingest");
        return Ok(());
    }

    let report = match call(app_config, IngestProcessorInput::ProcessPayloads(payloads)).await? {
        IngestProcessorOutput::ProcessPayloads(report) => report,
        _ => return Err(anyhow!("Unexpected response type")),
    };

    if json {
        println!("{}", format_json(&report));
    } else {
        print_report(&report);
    }

    if report.has_failures() {
        print_warning(&format!("{} of {} events failed", report.failed, report.total));
    } else {
        print_success(&format!("{} events processed", report.total));
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    print_header(&format!("Batch {}", report.batch_id));

    let rows = report
        .outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| match outcome {
            EventOutcome::Success(e) => vec![
                (i + 1).to_string(),
                "ok".green().to_string(),
                e.asset_id.clone(),
                format_ts(e.observed_at),
                format!(
                    "{} avg={} pct={}",
                    format_signal(Some(e.result.signal)),
                    format_decimal(e.result.stat.avg.as_ref()),
                    format_decimal(e.result.pct_change.as_ref())
                ),
            ],
            EventOutcome::Skipped { asset_id, skip } => vec![
                (i + 1).to_string(),
                "skipped".yellow().to_string(),
                asset_id.clone(),
                "-".to_string(),
                skip.to_string(),
            ],
            EventOutcome::Failed(f) => vec![
                (i + 1).to_string(),
                "failed".red().to_string(),
                f.asset_id.clone().unwrap_or_else(|| "?".to_string()),
                f.observed_at.map(format_ts).unwrap_or_else(|| "-".to_string()),
                format!("{}: {}", f.stage, f.error),
            ],
        })
        .collect();

    format_table(vec!["#", "Outcome", "Asset", "Observed", "Detail"], rows);
}

async fn show_window(app_config: &AppConfig, asset_id: String, now: Option<i64>, json: bool) -> Result<()> {
    let snapshot = match call(app_config, IngestProcessorInput::GetWindow(GetWindowInputArgs { asset_id, now })).await? {
        IngestProcessorOutput::GetWindow(snapshot) => snapshot,
        _ => return Err(anyhow!("Unexpected response type")),
    };

    if json {
        println!("{}", format_json(&snapshot));
        return Ok(());
    }

    print_window(&snapshot);
    Ok(())
}

fn print_window(s: &WindowSnapshot) {
    print_header(&format!("Window for {}", s.asset_id));
    let rows = vec![
        vec!["window".to_string(), format!("{} .. {}", format_ts(s.window_start), format_ts(s.window_end))],
        vec!["source".to_string(), format!("{:?}", s.stat.source)],
        vec!["count".to_string(), s.stat.count.to_string()],
        vec!["avg".to_string(), format_decimal(s.stat.avg.as_ref())],
        vec!["min".to_string(), format_decimal(s.stat.min.as_ref())],
        vec!["max".to_string(), format_decimal(s.stat.max.as_ref())],
        vec!["price".to_string(), format_decimal(s.current_price.as_ref())],
        vec!["pct_change".to_string(), format_decimal(s.pct_change.as_ref())],
        vec!["signal".to_string(), format_signal(Some(s.signal))],
    ];
    format_table(vec!["Field", "Value"], rows);
}

async fn show_buckets(app_config: &AppConfig, range: RangeInputArgs, json: bool) -> Result<()> {
    let buckets = match call(app_config, IngestProcessorInput::GetAggregates(range)).await? {
        IngestProcessorOutput::GetAggregates(buckets) => buckets,
        _ => return Err(anyhow!("Unexpected response type")),
    };

    if json {
        println!("{}", format_json(&buckets));
        return Ok(());
    }

    if buckets.is_empty() {
        print_info("No buckets in range");
        return Ok(());
    }

    let rows = buckets
        .iter()
        .map(|b| {
            vec![
                format_ts(b.bucket_start),
                b.count.to_string(),
                format_decimal(b.mean().as_ref()),
                format_decimal(b.moving_avg.as_ref()),
                format_decimal(b.pct_change.as_ref()),
                format_signal(b.signal),
            ]
        })
        .collect();

    print_header("Bucket aggregates");
    format_table(vec!["Bucket", "Count", "Mean", "Moving avg", "Pct", "Signal"], rows);
    Ok(())
}

async fn show_raw(app_config: &AppConfig, range: RangeInputArgs, json: bool) -> Result<()> {
    let records = match call(app_config, IngestProcessorInput::GetRawEvents(range)).await? {
        IngestProcessorOutput::GetRawEvents(records) => records,
        _ => return Err(anyhow!("Unexpected response type")),
    };

    if json {
        println!("{}", format_json(&records));
        return Ok(());
    }

    if records.is_empty() {
        print_info("No raw events in range");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                format_ts(r.observed_at),
                format_decimal(Some(&r.price_usd)),
                format_decimal(r.market_cap_usd.as_ref()),
                format_decimal(r.hr24_volume.as_ref()),
                format_decimal(r.hr24_change.as_ref()),
            ]
        })
        .collect();

    print_header("Raw events");
    format_table(vec!["Observed", "Price", "Market cap", "24h vol", "24h change"], rows);
    Ok(())
}
