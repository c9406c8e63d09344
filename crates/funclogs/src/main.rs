mod client;
mod http;
mod output;
mod protocol;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use funclogs_backend::CloudLoggingClient;
use funclogs_core::config::Config;
use funclogs_core::executor::{ErrorClassification, QueryExecutor};
use funclogs_core::filter::{DEFAULT_SEVERITY, FilterBuilder};
use funclogs_core::query::QueryRequest;
use funclogs_core::time::{parse_time_or_relative, render_filter_timestamp};
use funclogs_store::Store;
use serde::Serialize;

use crate::client::GatewayClient;
use crate::http::AppState;
use crate::output::{print_entries_human, print_status_human, print_stored_human};
use crate::protocol::LogsQueryParams;
use crate::telemetry::{init_cli_tracing, init_serve_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "funclogs")]
#[command(about = "Query Cloud Functions logs from Google Cloud Logging over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Gateway address for client commands")]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the HTTP gateway")]
    Serve(ServeArgs),
    #[command(about = "Fetch logs for a function through a running gateway")]
    Query(TargetArgs),
    #[command(about = "Print the backend filter a query would send")]
    Filter(TargetArgs),
    #[command(about = "Fetch a stored entry by id or timestamp")]
    Get { key: String },
    #[command(about = "Show store status of a running gateway")]
    Status,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long)]
    listen_addr: Option<String>,
    #[arg(long)]
    db_path: Option<PathBuf>,
    #[arg(long, help = "Service account JSON key")]
    credentials: Option<PathBuf>,
    #[arg(long)]
    project_id: Option<String>,
    #[arg(long)]
    logging_endpoint: Option<String>,
    #[arg(long, help = "narrow or strict")]
    error_classification: Option<ErrorClassification>,
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    name: String,
    #[arg(long)]
    region: String,
    #[arg(long, help = "ISO-8601 time or duration ago (e.g. 2h)")]
    start: String,
    #[arg(long, help = "ISO-8601 time or duration ago; defaults to now")]
    end: Option<String>,
    #[arg(long, help = "Extra Cloud Logging filter, ANDed onto the query")]
    filter: Option<String>,
    #[arg(long, default_value = DEFAULT_SEVERITY)]
    severity: String,
}

impl TargetArgs {
    fn into_request(self) -> anyhow::Result<QueryRequest> {
        let start = parse_time_or_relative(&self.start).context("parse --start")?;
        let end = match self.end.as_deref() {
            Some(end) => parse_time_or_relative(end).context("parse --end")?,
            None => chrono::Utc::now(),
        };
        Ok(QueryRequest {
            start: Some(start),
            end: Some(end),
            filter: self.filter.unwrap_or_default(),
            severity: self.severity,
            ..QueryRequest::new(self.name, self.region)
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_server(args).await,
        Commands::Query(args) => {
            init_cli_tracing();
            let client = GatewayClient::connect(cli.addr)?;
            let req = args.into_request()?;
            let params = LogsQueryParams {
                cloud_function_region: Some(req.target_region.clone()),
                start_time: req.start.map(render_filter_timestamp),
                end_time: req.end.map(render_filter_timestamp),
                log_query: Some(req.filter.clone()).filter(|f| !f.is_empty()),
                severity: Some(req.severity.clone()),
            };
            let entries = client.logs(&req.target_name, &params).await?;
            if cli.json {
                print_json(&entries)
            } else {
                print_entries_human(&entries);
                Ok(())
            }
        }
        Commands::Filter(args) => {
            let req = args.into_request()?;
            req.validate()?;
            let filter = FilterBuilder::build(&req);
            if cli.json {
                print_json(&serde_json::json!({ "filter": filter }))
            } else {
                println!("{filter}");
                Ok(())
            }
        }
        Commands::Get { key } => {
            init_cli_tracing();
            let stored = GatewayClient::connect(cli.addr)?.entry(&key).await?;
            if cli.json {
                print_json(&stored)
            } else {
                print_stored_human(&stored);
                Ok(())
            }
        }
        Commands::Status => {
            init_cli_tracing();
            let status = GatewayClient::connect(cli.addr)?.status().await?;
            if cli.json {
                print_json(&status)
            } else {
                print_status_human(&status);
                Ok(())
            }
        }
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = args.listen_addr {
        cfg.listen_addr = v;
    }
    if let Some(v) = args.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = args.credentials {
        cfg.credentials_path = Some(v);
    }
    if let Some(v) = args.project_id {
        cfg.project_id = Some(v);
    }
    if let Some(v) = args.logging_endpoint {
        cfg.logging_endpoint = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = args.error_classification {
        cfg.error_classification = v;
    }
    cfg.validate().context("validate config")?;

    init_serve_tracing();

    let store = Store::open(&cfg.db_path).context("open store")?;
    let backend = CloudLoggingClient::from_config(&cfg).context("configure cloud logging backend")?;
    let project = backend.config().project_id.clone();
    let executor =
        QueryExecutor::new(Arc::new(backend)).with_classification(cfg.error_classification);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;

    eprintln!("funclogs serve");
    eprintln!("  listen: {}", cfg.listen_addr);
    eprintln!("  db: {}", cfg.db_path.display());
    eprintln!("  project: {project}");
    eprintln!("  logging endpoint: {}", cfg.logging_endpoint);
    eprintln!("  error classification: {}", cfg.error_classification);

    let app = http::router(AppState { executor, store });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received ctrl-c, shutting down");
        })
        .await
        .context("http server failed")?;

    shutdown_tracing();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
